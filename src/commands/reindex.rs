//! Reindex command - re-embed every chunk

use crate::error::Result;
use crate::library::Library;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Reindex statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexStats {
    pub chunks_reindexed: usize,
    pub generation: u64,
    pub elapsed_ms: u128,
}

/// Rebuild the vector index from the stored chunks
pub async fn cmd_reindex(library: &Library) -> Result<ReindexStats> {
    info!("Starting reindex operation");
    let started = Instant::now();

    let chunks_reindexed = library.rebuild_index("reindex").await?;
    let generation = library.stats().await?.generation;

    Ok(ReindexStats {
        chunks_reindexed,
        generation,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

/// Print reindex statistics
pub fn print_reindex_stats(stats: &ReindexStats) {
    println!("\n✓ Reindex complete");
    println!("  Chunks reindexed: {}", stats.chunks_reindexed);
    println!("  Generation: {}", stats.generation);
    println!("  Took: {} ms", stats.elapsed_ms);
}
