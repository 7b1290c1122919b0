//! Document store coordinator
//!
//! `Library` keeps the SQLite document/chunk tables and the vector index in
//! lockstep. Every mutation rebuilds the whole index from the chunk table in
//! ascending-id order inside the same transaction that changed the tables:
//!
//! 1. write documents/chunks and stamp row indices
//! 2. record a build (its id becomes the index generation)
//! 3. embed every chunk and stage the new blob on disk
//! 4. under the write lock, rename the staged blob into place, commit and
//!    swap the live index
//!
//! A failure before the commit rolls the tables back and leaves the live
//! index untouched. A crash or failed commit after the rename leaves a blob
//! whose generation is ahead of the database, which `open` detects and
//! repairs.

use crate::chunk::compute_text_hash;
use crate::config::Config;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::meta::{MetaDb, StoreStats};
use crate::store::{FlatIndex, VectorStore};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of `upsert_document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertOutcome::Created => write!(f, "created"),
            UpsertOutcome::Updated => write!(f, "updated"),
            UpsertOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// A listed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub filename: String,
    pub content: String,
}

/// Combined store and index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub index_rows: usize,
    pub generation: u64,
    pub last_build: Option<String>,
    pub dimension: usize,
    pub model: String,
}

pub struct Library {
    db: MetaDb,
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    embed_timeout: Duration,
    writer: Mutex<()>,
}

impl Library {
    /// Open the store under `config.paths`, repairing the index if it does
    /// not match the database
    pub async fn open(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = MetaDb::connect(config).await?;
        let store = VectorStore::open(&config.paths.index_file, embedder.dimension())?;

        let library = Self {
            db,
            store,
            embedder,
            batch_size: config.embedding.batch_size,
            embed_timeout: config.embedding.timeout(),
            writer: Mutex::new(()),
        };

        if let Some(reason) = library.staleness().await? {
            warn!("Vector index is stale ({}); rebuilding", reason);
            library.rebuild_index("recovery").await?;
        }

        Ok(library)
    }

    pub fn db(&self) -> &MetaDb {
        &self.db
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Why the live index cannot be trusted, if it cannot
    async fn staleness(&self) -> Result<Option<String>> {
        let stats = self.db.stats().await?;
        let index = self.store.snapshot().await;

        if index.generation() != stats.generation {
            return Ok(Some(format!(
                "index generation {} but database generation {}",
                index.generation(),
                stats.generation
            )));
        }
        if index.len() != stats.chunk_count {
            return Ok(Some(format!(
                "{} index rows for {} chunks",
                index.len(),
                stats.chunk_count
            )));
        }
        if let Some(build) = self.db.latest_build().await? {
            if build.model != self.embedder.model_name() {
                return Ok(Some(format!(
                    "built with '{}', now using '{}'",
                    build.model,
                    self.embedder.model_name()
                )));
            }
        }
        Ok(None)
    }

    /// Insert or replace a document and its chunks, then rebuild the index
    pub async fn upsert_document(
        &self,
        filename: &str,
        content: &str,
        chunks: Vec<String>,
    ) -> Result<UpsertOutcome> {
        validate_document(filename, content)?;
        let content_hash = compute_text_hash(content);

        let _guard = self.writer.lock().await;
        let mut tx = self.db.begin().await?;

        let outcome = match MetaDb::find_document(&mut tx, filename).await? {
            Some(existing) if existing.content_hash == content_hash => {
                tx.rollback().await?;
                debug!("{} unchanged", filename);
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(existing) => {
                MetaDb::update_document(&mut tx, existing.id, content, &content_hash).await?;
                let removed = MetaDb::delete_chunks(&mut tx, existing.id).await?;
                MetaDb::insert_chunks(&mut tx, existing.id, &chunks).await?;
                debug!(
                    "{}: replaced {} chunks with {}",
                    filename,
                    removed,
                    chunks.len()
                );
                UpsertOutcome::Updated
            }
            None => {
                let id = MetaDb::insert_document(&mut tx, filename, content, &content_hash).await?;
                MetaDb::insert_chunks(&mut tx, id, &chunks).await?;
                UpsertOutcome::Created
            }
        };

        self.commit_with_rebuild(tx, "ingest").await?;
        info!("{} {} ({} chunks)", outcome, filename, chunks.len());
        Ok(outcome)
    }

    /// Documents in insertion order
    pub async fn list_documents(&self) -> Result<Vec<DocumentEntry>> {
        Ok(self
            .db
            .list_documents()
            .await?
            .into_iter()
            .map(|doc| DocumentEntry {
                filename: doc.filename,
                content: doc.content,
            })
            .collect())
    }

    /// Rebuild the index from the chunk table, returning the row count
    pub async fn rebuild_index(&self, reason: &str) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let tx = self.db.begin().await?;
        self.commit_with_rebuild(tx, reason).await
    }

    pub async fn stats(&self) -> Result<LibraryStats> {
        let StoreStats {
            document_count,
            chunk_count,
            generation,
            last_build,
        } = self.db.stats().await?;
        let index = self.store.snapshot().await;

        Ok(LibraryStats {
            document_count,
            chunk_count,
            index_rows: index.len(),
            generation,
            last_build,
            dimension: index.dimension(),
            model: self.embedder.model_name().to_string(),
        })
    }

    /// Close the underlying database
    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn commit_with_rebuild(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        reason: &str,
    ) -> Result<usize> {
        let texts = MetaDb::assign_row_indices(&mut tx).await?;
        let row_count = texts.len();
        let dimension = self.store.dimension();
        let generation = MetaDb::record_build(
            &mut tx,
            reason,
            row_count,
            dimension,
            self.embedder.model_name(),
        )
        .await?;

        debug!("Embedding {} chunks for generation {}", row_count, generation);
        let vectors = embed_in_batches(
            self.embedder.as_ref(),
            texts,
            self.batch_size,
            self.embed_timeout,
        )
        .await?;
        let index = FlatIndex::build(dimension, generation, vectors)?;
        let staged = self.store.stage(&index)?;

        {
            let mut live = self.store.write().await;
            // Dropping `tx` on a failed rename rolls the metadata back
            staged.publish()?;
            tx.commit().await?;
            *live = Arc::new(index);
        }

        info!(
            "Rebuilt vector index: {} rows, generation {} ({})",
            row_count, generation, reason
        );
        Ok(row_count)
    }
}

fn validate_document(filename: &str, content: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(Error::InvalidInput("filename must not be empty".to_string()));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "filename '{}' must not contain a path separator",
            filename
        )));
    }
    if content.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "content of '{}' contains NUL bytes",
            filename
        )));
    }
    Ok(())
}
