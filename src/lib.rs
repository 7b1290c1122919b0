//! kbase - a local knowledge base
//!
//! This crate provides:
//! - A SQLite document store kept in lockstep with an exact vector index
//! - Semantic search over ingested text files
//! - A retrieval-augmented answer heuristic backed by an OpenAI-compatible LLM

pub mod answer;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod library;
pub mod llm;
pub mod meta;
pub mod progress;
pub mod rank;
pub mod retrieve;
pub mod store;
pub mod upstream;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::{Error, Result};
