//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - HTTP embedding backend
//! - Local embedding support via fastembed
//! - Batched, time-bounded embedding for index rebuilds

mod http_backend;

#[cfg(feature = "local-embed")]
mod fastembed_impl;

pub use http_backend::*;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};
use crate::error::{Error, Result};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::upstream::with_timeout;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Scale a vector to unit length; zero vectors are returned unchanged
pub fn normalize_embedding(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::permanent("Embedding backend returned no vector"))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend_kind()? {
        EmbeddingBackendKind::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
        #[cfg(feature = "local-embed")]
        EmbeddingBackendKind::Local => Ok(Arc::new(FastEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embed"))]
        EmbeddingBackendKind::Local => Err(Error::Config(
            "Local embedding requires the 'local-embed' feature; set embedding.backend = \"http\""
                .to_string(),
        )),
    }
}

/// Embed in batches with progress; every call is bounded by `timeout`
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    let total = texts.len();
    let batch_size = batch_size.max(1);
    let mut all_embeddings = Vec::with_capacity(total);

    let progress = if total > batch_size {
        start_progress_bar(total, "Embedding chunks")
    } else {
        None
    };

    for chunk in texts.chunks(batch_size) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let expected = batch_texts.len();
        let embeddings = with_timeout("embedding batch", timeout, embedder.embed(batch_texts)).await?;

        if embeddings.len() != expected {
            return Err(Error::permanent(format!(
                "Embedding backend returned {} vectors for {} inputs",
                embeddings.len(),
                expected
            )));
        }

        all_embeddings.extend(embeddings);
        advance_progress(&progress, expected as u64);
    }

    finish_progress(progress);

    debug!("Embedded {} texts with {}", total, embedder.model_name());
    Ok(all_embeddings)
}
