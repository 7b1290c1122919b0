//! Retrieval-augmented answers and a completeness heuristic

use crate::config::{AnswerConfig, Config};
use crate::error::{Error, Result};
use crate::llm::Completer;
use crate::retrieve::Retriever;
use crate::upstream::{with_retry, with_timeout, RetryPolicy};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Whether the store holds enough to answer a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct Answerer {
    retriever: Retriever,
    completer: Option<Arc<dyn Completer>>,
    settings: AnswerConfig,
    retry: RetryPolicy,
    llm_timeout: Duration,
}

impl Answerer {
    pub fn new(retriever: Retriever, config: &Config) -> Self {
        Self {
            retriever,
            completer: None,
            settings: config.answer.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            llm_timeout: config.llm.timeout(),
        }
    }

    pub fn with_completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.completer = Some(completer);
        self
    }

    /// Context from the configured number of results and per-result limit
    pub async fn build_context(&self, query: &str) -> Result<String> {
        self.build_context_with(
            query,
            self.settings.max_results,
            self.settings.max_chars_per_result,
        )
        .await
    }

    /// Each retrieved document's text, cut to `max_chars_per_result`
    /// characters, joined by newlines in rank order
    pub async fn build_context_with(
        &self,
        query: &str,
        max_results: usize,
        max_chars_per_result: usize,
    ) -> Result<String> {
        let results = self.retriever.retrieve(query, max_results).await?;
        debug!("Building context from {} results", results.len());

        Ok(results
            .iter()
            .map(|r| truncate_chars(&r.content, max_chars_per_result))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Ask the LLM to answer `query` from retrieved context; the response is
    /// returned as-is
    pub async fn answer(&self, query: &str) -> Result<String> {
        let completer = self
            .completer
            .as_deref()
            .ok_or_else(|| Error::Config("no LLM configured".to_string()))?;

        let context = self.build_context(query).await?;
        let prompt = format!(
            "Answer the question based on the context:\n{}\n\nQuestion: {}",
            context, query
        );

        info!("Asking {} to answer", completer.model_name());
        let timeout = self.llm_timeout;
        let prompt = prompt.as_str();
        with_retry(&self.retry, "LLM completion", move || {
            with_timeout("LLM completion", timeout, completer.complete(prompt))
        })
        .await
    }

    /// Judge completeness from the best similarity score
    pub async fn check_completeness(&self, query: &str) -> Result<CompletenessReport> {
        let results = self
            .retriever
            .retrieve(query, self.settings.max_results)
            .await?;

        let Some(top) = results.first() else {
            return Ok(CompletenessReport {
                complete: false,
                top_score: None,
                reason: Some("no documents found".to_string()),
            });
        };

        let complete = top.score > self.settings.completeness_threshold;
        debug!(
            "Top score {:.3} against threshold {:.3}",
            top.score, self.settings.completeness_threshold
        );

        Ok(CompletenessReport {
            complete,
            top_score: Some(top.score),
            reason: None,
        })
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::test_utils::{FakeCompleter, HashEmbedder};
    use tempfile::TempDir;

    struct Fixture {
        library: Arc<Library>,
        config: Config,
        _tmp: TempDir,
    }

    impl Fixture {
        async fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = Config::default();
            config.init_paths(Some(tmp.path().to_path_buf()));
            config.retry.base_delay_ms = 1;

            let embedder = Arc::new(HashEmbedder::new(64));
            let library = Arc::new(Library::open(&config, embedder).await.unwrap());
            Self {
                library,
                config,
                _tmp: tmp,
            }
        }

        fn answerer(&self) -> Answerer {
            Answerer::new(
                Retriever::from_config(self.library.clone(), &self.config),
                &self.config,
            )
        }

        async fn ingest(&self, filename: &str, text: &str, chunks: &[&str]) {
            self.library
                .upsert_document(
                    filename,
                    text,
                    chunks.iter().map(|c| c.to_string()).collect(),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_incomplete() {
        let fixture = Fixture::new().await;
        let report = fixture.answerer().check_completeness("anything").await.unwrap();

        assert_eq!(
            report,
            CompletenessReport {
                complete: false,
                top_score: None,
                reason: Some("no documents found".to_string()),
            }
        );
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"complete": false, "reason": "no documents found"})
        );
    }

    #[tokio::test]
    async fn test_completeness_uses_threshold() {
        let fixture = Fixture::new().await;
        fixture
            .ingest("doc2.txt", "Python is a programming language.", &["python programming"])
            .await;

        // Shares both words with the only chunk
        let strong = fixture
            .answerer()
            .check_completeness("python programming")
            .await
            .unwrap();
        assert!(strong.complete);
        assert!(strong.top_score.unwrap() > 0.99);

        // Shares one word of five: cosine ~0.32
        let weak = fixture
            .answerer()
            .check_completeness("python memory safety garbage collector")
            .await
            .unwrap();
        assert!(!weak.complete);
        assert!(weak.top_score.unwrap() < 0.5);
        assert!(weak.reason.is_none());
    }

    #[tokio::test]
    async fn test_context_uses_truncated_document_content() {
        let fixture = Fixture::new().await;
        let long = format!("rust {}", "x".repeat(2000));
        fixture.ingest("a.txt", &long, &["rust"]).await;
        fixture.ingest("b.txt", "rust ownership", &["rust ownership"]).await;

        let context = fixture
            .answerer()
            .build_context_with("rust", 3, 10)
            .await
            .unwrap();

        let parts: Vec<&str> = context.split('\n').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "rust xxxxx");
        assert_eq!(parts[1], "rust owner");
    }

    #[tokio::test]
    async fn test_answer_sends_prompt_and_returns_raw_response() {
        let fixture = Fixture::new().await;
        fixture
            .ingest("doc2.txt", "Python is a programming language.", &["python programming"])
            .await;

        let completer = Arc::new(FakeCompleter::new(" It is a language.\n"));
        let answerer = fixture.answerer().with_completer(completer.clone());

        let answer = answerer.answer("What is python?").await.unwrap();

        assert_eq!(answer, " It is a language.\n");
        assert_eq!(
            completer.prompts(),
            vec![
                "Answer the question based on the context:\nPython is a programming language.\n\nQuestion: What is python?"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_answer_retries_llm_timeouts() {
        let fixture = Fixture::new().await;
        fixture.ingest("a.txt", "rust", &["rust"]).await;

        let completer = Arc::new(FakeCompleter::new("ok"));
        completer.fail_next(1);
        let answerer = fixture.answerer().with_completer(completer.clone());

        assert_eq!(answerer.answer("rust").await.unwrap(), "ok");
        assert_eq!(completer.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_answer_without_llm_is_config_error() {
        let fixture = Fixture::new().await;
        let err = fixture.answerer().answer("rust").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
