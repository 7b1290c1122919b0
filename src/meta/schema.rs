//! SQLite schema definition

/// SQL schema for the document store
pub const SCHEMA_SQL: &str = r#"
-- Documents: one row per ingested filename
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Chunks: ascending id order is the vector index row order
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id INTEGER NOT NULL REFERENCES documents(id),
    chunk_index INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    row_index INTEGER,
    UNIQUE(doc_id, chunk_index)
);

-- Index builds: id is the generation stamped into the vector blob
CREATE TABLE IF NOT EXISTS index_builds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reason TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    dimension INTEGER NOT NULL,
    model TEXT NOT NULL,
    built_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_chunks_row ON chunks(row_index);
"#;
