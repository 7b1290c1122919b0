//! Answer and completeness commands

use crate::answer::{Answerer, CompletenessReport};
use crate::config::Config;
use crate::error::Result;
use crate::library::Library;
use crate::llm::create_completer;
use crate::retrieve::Retriever;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub query: String,
    pub answer: String,
}

/// Answer a question with the configured LLM
pub async fn cmd_answer(config: &Config, library: Arc<Library>, query: &str) -> Result<AnswerResult> {
    let completer = create_completer(&config.llm)?;
    let answerer =
        Answerer::new(Retriever::from_config(library, config), config).with_completer(completer);

    let answer = answerer.answer(query).await?;
    Ok(AnswerResult {
        query: query.to_string(),
        answer,
    })
}

/// Judge whether the store likely covers a question
pub async fn cmd_complete(
    config: &Config,
    library: Arc<Library>,
    query: &str,
) -> Result<CompletenessReport> {
    let answerer = Answerer::new(Retriever::from_config(library, config), config);
    answerer.check_completeness(query).await
}

pub fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer);
}

pub fn print_completeness(report: &CompletenessReport) {
    let verdict = if report.complete {
        "✓ Likely answerable"
    } else {
        "✗ Probably not covered"
    };
    println!("{}", verdict);
    if let Some(score) = report.top_score {
        println!("  Top score: {:.3}", score);
    }
    if let Some(reason) = &report.reason {
        println!("  Reason: {}", reason);
    }
}
