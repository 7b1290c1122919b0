//! Ingest command implementation

use crate::chunk::{RecursiveSplitter, Splitter};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::library::{Library, UpsertOutcome};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub files_found: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub chunks_written: usize,
    pub errors: Vec<String>,
}

/// Ingest `.txt` files and directories of them
pub async fn cmd_ingest(config: &Config, library: &Library, paths: &[PathBuf]) -> Result<IngestStats> {
    let files = collect_text_files(paths)?;
    info!("Found {} files to process", files.len());

    let splitter = RecursiveSplitter::from_config(&config.chunk);
    let mut stats = IngestStats {
        files_found: files.len(),
        ..Default::default()
    };
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let progress = start_progress_bar(files.len(), "Ingesting files");

    for path in files {
        let result = ingest_file(library, &splitter, &path).await;
        advance_progress(&progress, 1);

        match result {
            Ok((filename, outcome, chunk_count)) => {
                if let Some(previous) = seen.insert(filename.clone(), path.clone()) {
                    warn!(
                        "{} and {} share the name '{}'; the later file replaces the earlier",
                        previous.display(),
                        path.display(),
                        filename
                    );
                }
                match outcome {
                    UpsertOutcome::Created => stats.created += 1,
                    UpsertOutcome::Updated => stats.updated += 1,
                    UpsertOutcome::Unchanged => stats.unchanged += 1,
                }
                if outcome != UpsertOutcome::Unchanged {
                    stats.chunks_written += chunk_count;
                }
            }
            // Bad files are skipped; store or upstream failures end the run
            Err(Error::InvalidInput(message)) => {
                warn!("Skipping {}: {}", path.display(), message);
                stats.errors.push(format!("{}: {}", path.display(), message));
            }
            Err(e) => {
                finish_progress(progress);
                return Err(e);
            }
        }
    }

    finish_progress(progress);
    info!(
        "Ingest complete: {} created, {} updated, {} unchanged",
        stats.created, stats.updated, stats.unchanged
    );
    Ok(stats)
}

async fn ingest_file(
    library: &Library,
    splitter: &dyn Splitter,
    path: &Path,
) -> Result<(String, UpsertOutcome, usize)> {
    let (filename, content) = read_text_file(path)?;
    let chunks = splitter.split(&content);
    let chunk_count = chunks.len();
    let outcome = library.upsert_document(&filename, &content, chunks).await?;
    Ok((filename, outcome, chunk_count))
}

/// Expand paths into a sorted list of `.txt` files; directories are walked
/// honoring ignore files
pub fn collect_text_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let walker = WalkBuilder::new(path)
                .hidden(false)
                .git_ignore(true)
                .git_exclude(true)
                .require_git(false)
                .build();

            for entry in walker {
                match entry {
                    Ok(e) if e.file_type().map(|t| t.is_file()).unwrap_or(false) => {
                        if is_text_file(e.path()) {
                            files.push(e.path().to_path_buf());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable entry under {}: {}", path.display(), e),
                }
            }
        } else if path.is_file() {
            if !is_text_file(path) {
                return Err(Error::InvalidInput(format!(
                    "{} is not a .txt file",
                    path.display()
                )));
            }
            files.push(path.clone());
        } else {
            return Err(Error::InvalidInput(format!(
                "{} does not exist",
                path.display()
            )));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// Read a UTF-8 text file, returning its base name and content
pub fn read_text_file(path: &Path) -> Result<(String, String)> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!("{} has no usable file name", path.display()))
        })?
        .to_string();

    let bytes = std::fs::read(path)?;
    if bytes.contains(&0) {
        return Err(Error::InvalidInput(format!(
            "{} looks like a binary file",
            filename
        )));
    }
    let content = String::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput(format!("{} is not valid UTF-8", filename)))?;

    Ok((filename, content))
}

/// Print ingest statistics
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n✓ Ingestion complete");
    println!("  Files found: {}", stats.files_found);
    println!("  Created: {}", stats.created);
    println!("  Updated: {}", stats.updated);
    println!("  Unchanged: {}", stats.unchanged);
    println!("  Chunks written: {}", stats.chunks_written);

    if !stats.errors.is_empty() {
        println!("\n⚠ Skipped {} files:", stats.errors.len());
        for error in &stats.errors {
            println!("  - {}", error);
        }
    }
}
