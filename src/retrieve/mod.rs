//! Semantic retrieval
//!
//! Embeds a query, searches the live index and joins each hit back to its
//! chunk and document. The index read guard is held across the join so a
//! concurrent rebuild cannot shift rows underneath a query.

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::rank::{dedupe_by_document, filter_by_score};
use crate::upstream::{with_retry, with_timeout, RetryPolicy};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One retrieved chunk
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub filename: String,
    pub chunk_text: String,
    pub score: f32,
    /// Full text of the owning document
    #[serde(skip_serializing)]
    pub content: String,
}

/// Search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Number of results to return
    pub top_k: usize,
    /// Minimum score threshold
    pub min_score: Option<f32>,
    /// Deduplicate by document
    pub dedupe_docs: bool,
}

pub struct Retriever {
    library: Arc<Library>,
    retry: RetryPolicy,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(library: Arc<Library>, retry: RetryPolicy, embed_timeout: Duration) -> Self {
        Self {
            library,
            retry,
            embed_timeout,
        }
    }

    pub fn from_config(library: Arc<Library>, config: &Config) -> Self {
        Self::new(
            library,
            RetryPolicy::from_config(&config.retry),
            config.embedding.timeout(),
        )
    }

    /// Top `top_k` chunks for `query`, best first
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }

        let embedder: &dyn Embedder = self.library.embedder().as_ref();
        let timeout = self.embed_timeout;
        let vector = with_retry(&self.retry, "query embedding", move || {
            with_timeout("query embedding", timeout, embedder.embed_one(query))
        })
        .await?;

        let index = self.library.store().read().await;
        let hits = index.search(&vector, top_k)?;
        debug!("Index returned {} rows", hits.len());

        let db = self.library.db();
        let mut results = Vec::with_capacity(hits.len());
        for (row, score) in hits {
            match db.resolve_row(row).await? {
                Some(hit) if hit.position == row as i64 => results.push(SearchResult {
                    filename: hit.filename,
                    chunk_text: hit.chunk_text,
                    score,
                    content: hit.content,
                }),
                _ => {
                    return Err(Error::StaleIndexMapping {
                        row,
                        chunk_count: db.count_chunks().await?,
                    })
                }
            }
        }

        Ok(results)
    }

    /// `retrieve` plus optional score filtering and per-document dedupe
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        info!("Searching: {}", query);

        let filtering = options.min_score.is_some() || options.dedupe_docs;
        let candidates = if filtering {
            options.top_k.saturating_mul(2)
        } else {
            options.top_k
        };

        let mut results = self.retrieve(query, candidates).await?;

        if let Some(min_score) = options.min_score {
            results = filter_by_score(results, min_score);
        }
        if options.dedupe_docs {
            results = dedupe_by_document(results);
        }
        results.truncate(options.top_k);

        info!("Returning {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::HashEmbedder;
    use tempfile::TempDir;

    async fn setup() -> (Retriever, Arc<Library>, Arc<HashEmbedder>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.retry.base_delay_ms = 1;

        let embedder = Arc::new(HashEmbedder::new(64));
        let library = Arc::new(Library::open(&config, embedder.clone()).await.unwrap());
        let retriever = Retriever::from_config(library.clone(), &config);
        (retriever, library, embedder, tmp)
    }

    async fn ingest(library: &Library, filename: &str, text: &str) {
        library
            .upsert_document(filename, text, vec![text.to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let (retriever, _library, _, _tmp) = setup().await;
        let results = retriever.retrieve("anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (retriever, _library, _, _tmp) = setup().await;
        let err = retriever.retrieve("  ", 5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_best_match_first() {
        let (retriever, library, _, _tmp) = setup().await;
        ingest(&library, "doc1.txt", "This is a test document.").await;
        ingest(&library, "doc2.txt", "Python is a programming language.").await;

        let results = retriever.retrieve("programming", 5).await.unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].filename, "doc2.txt");
        assert_eq!(results[0].chunk_text, "Python is a programming language.");
        assert_eq!(results[0].content, "Python is a programming language.");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_top_k_larger_than_index() {
        let (retriever, library, _, _tmp) = setup().await;
        ingest(&library, "a.txt", "rust memory").await;
        ingest(&library, "b.txt", "garbage collector").await;

        let results = retriever.retrieve("rust", 50).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_embedding_failure_is_retried() {
        let (retriever, library, embedder, _tmp) = setup().await;
        ingest(&library, "a.txt", "rust memory").await;

        embedder.fail_next(1);
        let results = retriever.retrieve("rust", 1).await.unwrap();
        assert_eq!(results[0].filename, "a.txt");
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let (retriever, library, embedder, _tmp) = setup().await;
        ingest(&library, "a.txt", "rust memory").await;
        let before = embedder.calls();

        embedder.fail_next(5);
        let err = retriever.retrieve("rust", 1).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(embedder.calls() - before, 2);
    }

    #[tokio::test]
    async fn test_drifted_row_mapping_is_reported() {
        let (retriever, library, _, _tmp) = setup().await;
        ingest(&library, "a.txt", "rust memory").await;
        ingest(&library, "b.txt", "garbage collector").await;

        sqlx::query("UPDATE chunks SET row_index = NULL WHERE chunk_text = 'garbage collector'")
            .execute(library.db().pool())
            .await
            .unwrap();

        let err = retriever.retrieve("garbage", 2).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StaleIndexMapping {
                row: 1,
                chunk_count: 2
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_rebuilds_see_whole_index() {
        let (retriever, library, _, _tmp) = setup().await;
        ingest(&library, "a.txt", "rust memory safety").await;
        ingest(&library, "b.txt", "garbage collector pauses").await;
        let retriever = Arc::new(retriever);

        let writer = {
            let library = library.clone();
            tokio::spawn(async move {
                for i in 0..30 {
                    let chunks: Vec<String> = (0..(i % 4 + 1))
                        .map(|j| format!("rust chunk {} {}", i, j))
                        .collect();
                    library
                        .upsert_document("a.txt", &format!("rust revision {}", i), chunks)
                        .await
                        .unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let retriever = retriever.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    match retriever.retrieve("rust chunk", 10).await {
                        Ok(results) => assert!(!results.is_empty()),
                        Err(e) => panic!("query failed during rebuild: {}", e),
                    }
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        let stats = library.stats().await.unwrap();
        assert_eq!(stats.index_rows, stats.chunk_count);
    }

    #[tokio::test]
    async fn test_search_options() {
        let (retriever, library, _, _tmp) = setup().await;
        library
            .upsert_document(
                "a.txt",
                "rust safety",
                vec!["rust safety".to_string(), "rust ownership".to_string()],
            )
            .await
            .unwrap();
        ingest(&library, "b.txt", "rust borrow checker").await;
        ingest(&library, "c.txt", "garbage collector").await;

        let options = SearchOptions {
            top_k: 5,
            min_score: Some(0.1),
            dedupe_docs: true,
        };
        let results = retriever.search("rust", &options).await.unwrap();

        let mut names: Vec<_> = results.iter().map(|r| r.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
