//! Search command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::retrieve::{Retriever, SearchOptions, SearchResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Number of results to return
    pub k: Option<usize>,
    /// Minimum score threshold
    pub min_score: Option<f32>,
    /// Deduplicate by document
    pub dedupe_docs: bool,
}

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Execute a search
pub async fn cmd_search(
    config: &Config,
    library: Arc<Library>,
    query: &str,
    options: QueryOptions,
) -> Result<QueryResult> {
    let k = options.k.unwrap_or(config.query.default_k);
    if k > config.query.max_results {
        return Err(Error::InvalidInput(format!(
            "limit {} exceeds query.max_results ({})",
            k, config.query.max_results
        )));
    }

    let min_score = options
        .min_score
        .or_else(|| (config.query.min_score > -1.0).then_some(config.query.min_score));

    let retriever = Retriever::from_config(library, config);
    let results = retriever
        .search(
            query,
            &SearchOptions {
                top_k: k,
                min_score,
                dedupe_docs: options.dedupe_docs,
            },
        )
        .await?;

    info!("Found {} results", results.len());
    Ok(QueryResult {
        query: query.to_string(),
        results,
    })
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);
    println!("Found {} results:\n", result.results.len());

    for (i, r) in result.results.iter().enumerate() {
        println!("{}. [score: {:.3}] {}", i + 1, r.score, r.filename);

        let text = r.chunk_text.trim();
        let preview = if text.chars().count() > 200 {
            format!("{}...", text.chars().take(200).collect::<String>())
        } else {
            text.to_string()
        };
        println!("   {}\n", preview.replace('\n', " "));
    }
}
