//! Object storage
//!
//! [`ObjectStore`] is the minimal surface the archiver needs from a durable
//! store: put, a compose primitive with a fixed fan-in limit, delete, content
//! type metadata, stat, read and prefix listing. Paths are `/`-separated keys
//! relative to the store root.

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod archiver;
mod fs;
mod memory;

pub use archiver::{ArchivedObject, PartitionedArchiver};
pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Metadata of a stored object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Size in bytes
    pub size: u64,
    /// Content type, once set
    pub content_type: Option<String>,
}

/// A durable object store with a bounded compose primitive
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Maximum number of sources one `compose` call accepts
    fn compose_limit(&self) -> usize;

    /// Write an object, replacing any existing one. Returns the stored size.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<u64>;

    /// Concatenate `sources` in order into `destination`.
    ///
    /// `destination` may be one of the sources. Fails with
    /// [`StorageError::FanInExceeded`] when more than `compose_limit` sources
    /// are given. Returns the size of the composed object.
    async fn compose(&self, sources: &[String], destination: &str) -> Result<u64>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Set the content type an object is served with
    async fn set_content_type(&self, path: &str, content_type: &str) -> Result<()>;

    /// Metadata of an object, `None` when it does not exist
    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Full contents of an object
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Paths of all objects under `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Reject empty paths, absolute paths and `.`/`..` segments
pub fn validate_path(path: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(StorageError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        }
        .into())
    };

    if path.is_empty() {
        return invalid("empty path");
    }
    if path.starts_with('/') {
        return invalid("absolute path");
    }
    if path.contains('\\') {
        return invalid("backslash in path");
    }
    for segment in path.split('/') {
        match segment {
            "" => return invalid("empty segment"),
            "." | ".." => return invalid("relative segment"),
            s if s.starts_with('.') => return invalid("hidden segment"),
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn check_fan_in(count: usize, limit: usize, destination: &str) -> Result<()> {
    if count == 0 {
        return Err(StorageError::Backend {
            path: destination.to_string(),
            reason: "compose requires at least one source".to_string(),
        }
        .into());
    }
    if count > limit {
        return Err(StorageError::FanInExceeded { count, limit }.into());
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
