//! Large-language-model collaborator
//!
//! The answer heuristic only needs "prompt in, text out"; the default backend
//! speaks the OpenAI-compatible chat completions protocol.

mod http_backend;

pub use http_backend::*;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for text completion providers
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete a single user prompt, returning the raw response text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a completer based on configuration; the API key is read from the
/// configured environment variable
pub fn create_completer(config: &LlmConfig) -> Result<Arc<dyn Completer>> {
    let api_key = config
        .api_key()
        .ok_or_else(|| Error::Config(format!("{} not set", config.api_key_env)))?;
    Ok(Arc::new(ChatCompleter::new(config, api_key)?))
}
