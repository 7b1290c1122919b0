//! Vector index storage
//!
//! This module owns the similarity index shared by readers and the writer:
//! - `FlatIndex`: exact cosine search over unit vectors
//! - `VectorStore`: the lock-guarded live index plus its persisted blob
//!
//! A rebuilt index is staged to a temporary sibling file before the metadata
//! transaction commits, then renamed into place once it is live.

mod flat;

pub use flat::*;

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Live index handle
pub struct VectorStore {
    path: PathBuf,
    dimension: usize,
    index: RwLock<Arc<FlatIndex>>,
}

impl VectorStore {
    /// Load the blob at `path`. A missing or unusable blob yields an empty
    /// index at generation 0, which the caller is expected to rebuild.
    pub fn open(path: &Path, dimension: usize) -> Result<Self> {
        let index = load_blob(path, dimension)?;
        info!(
            "Loaded vector index: {} rows, generation {}",
            index.len(),
            index.generation()
        );

        Ok(Self {
            path: path.to_path_buf(),
            dimension,
            index: RwLock::new(Arc::new(index)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Shared access for a search plus its metadata join
    pub async fn read(&self) -> RwLockReadGuard<'_, Arc<FlatIndex>> {
        self.index.read().await
    }

    /// Exclusive access for swapping in a rebuilt index
    pub async fn write(&self) -> RwLockWriteGuard<'_, Arc<FlatIndex>> {
        self.index.write().await
    }

    /// Current index without holding the lock
    pub async fn snapshot(&self) -> Arc<FlatIndex> {
        self.index.read().await.clone()
    }

    /// Write `index` to a synced temporary sibling of the blob path
    pub fn stage(&self, index: &FlatIndex) -> Result<StagedIndex> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.path.with_extension("idx.tmp");
        let staged = StagedIndex {
            temp,
            target: self.path.clone(),
            published: false,
        };

        let mut file = File::create(&staged.temp)?;
        file.write_all(&index.encode())?;
        file.sync_all()?;

        debug!(
            "Staged index generation {} at {:?}",
            index.generation(),
            staged.temp
        );
        Ok(staged)
    }
}

/// A fully written blob waiting to replace the live file; dropped unpublished
/// it is removed
pub struct StagedIndex {
    temp: PathBuf,
    target: PathBuf,
    published: bool,
}

impl StagedIndex {
    pub fn publish(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target)?;
        self.published = true;
        debug!("Published index blob to {:?}", self.target);
        Ok(())
    }
}

impl Drop for StagedIndex {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

fn load_blob(path: &Path, dimension: usize) -> Result<FlatIndex> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No index blob at {:?}", path);
            return Ok(FlatIndex::empty(dimension, 0));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    match FlatIndex::decode(&bytes) {
        Ok(index) if index.dimension() == dimension => Ok(index),
        Ok(index) => {
            warn!(
                "Discarding index blob built for dimension {} (expected {})",
                index.dimension(),
                dimension
            );
            Ok(FlatIndex::empty(dimension, 0))
        }
        Err(e) => {
            warn!("Discarding unreadable index blob {:?}: {}", path, e);
            Ok(FlatIndex::empty(dimension, 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index(generation: u64) -> FlatIndex {
        FlatIndex::build(2, generation, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap()
    }

    #[tokio::test]
    async fn test_missing_blob_opens_empty() {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::open(&tmp.path().join("vectors.idx"), 2).unwrap();

        let current = store.snapshot().await;
        assert!(current.is_empty());
        assert_eq!(current.generation(), 0);
    }

    #[tokio::test]
    async fn test_stage_publish_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vectors.idx");
        let store = VectorStore::open(&path, 2).unwrap();

        store.stage(&index(3)).unwrap().publish().unwrap();
        assert!(!path.with_extension("idx.tmp").exists());

        let reopened = VectorStore::open(&path, 2).unwrap();
        let current = reopened.snapshot().await;
        assert_eq!(current.len(), 2);
        assert_eq!(current.generation(), 3);
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_live_blob() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vectors.idx");
        let store = VectorStore::open(&path, 2).unwrap();
        store.stage(&index(1)).unwrap().publish().unwrap();

        let staged = store.stage(&index(2)).unwrap();
        drop(staged);

        assert!(!path.with_extension("idx.tmp").exists());
        let reopened = VectorStore::open(&path, 2).unwrap();
        assert_eq!(reopened.snapshot().await.generation(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_or_mismatched_blob_opens_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vectors.idx");

        fs::write(&path, b"garbage").unwrap();
        assert!(VectorStore::open(&path, 2).unwrap().snapshot().await.is_empty());

        fs::write(&path, index(4).encode()).unwrap();
        let other_dimension = VectorStore::open(&path, 3).unwrap();
        let current = other_dimension.snapshot().await;
        assert!(current.is_empty());
        assert_eq!(current.dimension(), 3);
    }
}
