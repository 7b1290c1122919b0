//! Metadata storage using SQLite
//!
//! This module holds the relational half of the knowledge base:
//! - Documents (keyed by filename, change-detected by content hash)
//! - Chunks (ascending id order defines vector index rows)
//! - Index builds (one row per rebuild; the id is the index generation)
//!
//! Mutations go through the `&mut SqliteConnection` helpers so that a caller
//! can group them into a single transaction.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite, SqliteConnection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// A stored document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub doc_id: i64,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub row_index: Option<i64>,
}

/// A chunk joined with its owning document, resolved from an index row
#[derive(Debug, Clone, FromRow)]
pub struct ChunkHit {
    pub chunk_id: i64,
    pub row_index: i64,
    pub chunk_text: String,
    pub doc_id: i64,
    pub filename: String,
    pub content: String,
    /// Live position of the chunk in ascending-id order
    pub position: i64,
}

/// A recorded index rebuild
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexBuild {
    pub id: i64,
    pub reason: String,
    pub row_count: i64,
    pub dimension: i64,
    pub model: String,
    pub built_at: String,
}

/// Document store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub generation: u64,
    pub last_build: Option<String>,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path` and apply the schema
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Applying database schema");
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Start a write transaction
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ===== Transactional writes =====

    /// Find a document by filename
    pub async fn find_document(
        conn: &mut SqliteConnection,
        filename: &str,
    ) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE filename = ?")
            .bind(filename)
            .fetch_optional(conn)
            .await?;
        Ok(doc)
    }

    /// Insert a new document, returning its id
    pub async fn insert_document(
        conn: &mut SqliteConnection,
        filename: &str,
        content: &str,
        content_hash: &str,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (filename, content, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(filename)
        .bind(content)
        .bind(content_hash)
        .bind(&now)
        .bind(&now)
        .execute(conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Replace a document's content in place
    pub async fn update_document(
        conn: &mut SqliteConnection,
        id: i64,
        content: &str,
        content_hash: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE documents SET content = ?, content_hash = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(content_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete every chunk of a document, returning how many were removed
    pub async fn delete_chunks(conn: &mut SqliteConnection, doc_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Append chunks for a document in order
    pub async fn insert_chunks(
        conn: &mut SqliteConnection,
        doc_id: i64,
        chunks: &[String],
    ) -> Result<()> {
        for (chunk_index, text) in chunks.iter().enumerate() {
            sqlx::query("INSERT INTO chunks (doc_id, chunk_index, chunk_text) VALUES (?, ?, ?)")
                .bind(doc_id)
                .bind(chunk_index as i64)
                .bind(text)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Stamp every chunk with its ascending-id position and return chunk
    /// texts in that same order
    pub async fn assign_row_indices(conn: &mut SqliteConnection) -> Result<Vec<String>> {
        sqlx::query(
            r#"
            UPDATE chunks SET row_index = ranked.position
            FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY id) - 1 AS position FROM chunks) AS ranked
            WHERE chunks.id = ranked.id
            "#,
        )
        .execute(&mut *conn)
        .await?;

        let texts: Vec<String> = sqlx::query_scalar("SELECT chunk_text FROM chunks ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        Ok(texts)
    }

    /// Record a rebuild and return its generation
    pub async fn record_build(
        conn: &mut SqliteConnection,
        reason: &str,
        row_count: usize,
        dimension: usize,
        model: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO index_builds (reason, row_count, dimension, model, built_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(reason)
        .bind(row_count as i64)
        .bind(dimension as i64)
        .bind(model)
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;
        Ok(result.last_insert_rowid() as u64)
    }

    // ===== Reads =====

    /// List documents in id order
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    /// Get a document by filename
    pub async fn get_document(&self, filename: &str) -> Result<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_document(&mut conn, filename).await
    }

    /// Get chunks for a document
    pub async fn get_chunks(&self, doc_id: i64) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT * FROM chunks WHERE doc_id = ? ORDER BY chunk_index",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Resolve an index row to its chunk and owning document
    pub async fn resolve_row(&self, row: usize) -> Result<Option<ChunkHit>> {
        let hit = sqlx::query_as::<_, ChunkHit>(
            r#"
            SELECT c.id AS chunk_id, c.row_index, c.chunk_text,
                   d.id AS doc_id, d.filename, d.content,
                   (SELECT COUNT(*) FROM chunks p WHERE p.id < c.id) AS position
            FROM chunks c
            JOIN documents d ON d.id = c.doc_id
            WHERE c.row_index = ?
            "#,
        )
        .bind(row as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hit)
    }

    /// Most recent index build, if any
    pub async fn latest_build(&self) -> Result<Option<IndexBuild>> {
        let build = sqlx::query_as::<_, IndexBuild>(
            "SELECT * FROM index_builds ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(build)
    }

    pub async fn count_documents(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn count_chunks(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Get global statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let build = self.latest_build().await?;
        Ok(StoreStats {
            document_count: self.count_documents().await?,
            chunk_count: self.count_chunks().await?,
            generation: build.as_ref().map(|b| b.id as u64).unwrap_or(0),
            last_build: build.map(|b| b.built_at),
        })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, flushing the WAL
    pub async fn close(&self) {
        info!("Closing document store");
        self.pool.close().await;
    }
}
