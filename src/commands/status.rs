//! Status and document listing

use crate::config::Config;
use crate::error::Result;
use crate::library::{DocumentEntry, Library, LibraryStats};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub index_path: String,
    pub embedding_backend: String,
    pub llm_model: String,
    pub stats: LibraryStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, library: &Library) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        index_path: config.paths.index_file.display().to_string(),
        embedding_backend: config.embedding.backend.clone(),
        llm_model: config.llm.model.clone(),
        stats: library.stats().await?,
    })
}

/// List stored documents
pub async fn cmd_list_documents(library: &Library) -> Result<Vec<DocumentEntry>> {
    library.list_documents().await
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 kbase Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Index: {}", status.index_path);
    println!(
        "\nEmbedding: {} ({}, {} dimensions)",
        status.stats.model, status.embedding_backend, status.stats.dimension
    );
    println!("LLM: {}", status.llm_model);
    println!("\nStore:");
    println!("  Documents: {}", status.stats.document_count);
    println!("  Chunks: {}", status.stats.chunk_count);
    println!("  Index rows: {}", status.stats.index_rows);
    println!("  Generation: {}", status.stats.generation);
    if let Some(built) = &status.stats.last_build {
        println!("  Last rebuild: {}", built);
    }
}

/// Print document list to console
pub fn print_documents(documents: &[DocumentEntry]) {
    println!("\n📚 Documents\n");

    if documents.is_empty() {
        println!("No documents yet. Use 'kbase ingest' to add some.");
        return;
    }

    for doc in documents {
        println!("• {} ({} chars)", doc.filename, doc.content.chars().count());
    }
}
