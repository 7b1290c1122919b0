//! CLI commands implementation

pub mod answer;
pub mod ingest;
pub mod init;
pub mod query;
pub mod reindex;
pub mod status;

pub use answer::*;
pub use ingest::*;
pub use init::*;
pub use query::*;
pub use reindex::*;
pub use status::*;

use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::{Error, Result};
use crate::library::Library;
use std::sync::Arc;

/// Open the library described by `config` with its configured embedder
pub async fn open_library(config: &Config) -> Result<Arc<Library>> {
    if !config.is_initialized() {
        return Err(Error::NotInitialized);
    }
    let embedder = create_embedder(&config.embedding)?;
    Ok(Arc::new(Library::open(config, embedder).await?))
}
