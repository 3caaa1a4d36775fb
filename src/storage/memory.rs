//! In-process object store

use super::{ObjectMeta, ObjectStore, check_fan_in, validate_path};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Clone, Debug)]
struct MemoryObject {
    data: Vec<u8>,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, MemoryObject>,
    tracked_prefix: Option<String>,
    peak_tracked: usize,
}

impl Inner {
    fn record_peak(&mut self) {
        if let Some(prefix) = &self.tracked_prefix {
            let live = self
                .objects
                .keys()
                .filter(|k| k.starts_with(prefix.as_str()))
                .count();
            self.peak_tracked = self.peak_tracked.max(live);
        }
    }
}

/// Object store held in memory
///
/// Used for tests and for running the pipeline without a disk-backed store.
/// It can track the highest number of objects that were ever live under one
/// prefix at the same time.
#[derive(Debug)]
pub struct MemoryObjectStore {
    compose_limit: usize,
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    /// Create an empty store with the given compose fan-in limit
    pub fn new(compose_limit: usize) -> Self {
        Self {
            compose_limit,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Track the peak number of live objects whose path starts with `prefix`
    pub fn with_tracked_prefix(self, prefix: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tracked_prefix = Some(prefix.into());
        }
        self
    }

    /// Highest number of objects ever live under the tracked prefix
    pub fn peak_tracked(&self) -> usize {
        self.inner.lock().map(|i| i.peak_tracked).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            StorageError::Backend {
                path: String::new(),
                reason: "memory store lock poisoned".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn compose_limit(&self) -> usize {
        self.compose_limit
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        validate_path(path)?;
        let size = data.len() as u64;
        let mut inner = self.lock()?;
        inner.objects.insert(
            path.to_string(),
            MemoryObject {
                data,
                content_type: None,
            },
        );
        inner.record_peak();
        Ok(size)
    }

    async fn compose(&self, sources: &[String], destination: &str) -> Result<u64> {
        validate_path(destination)?;
        check_fan_in(sources.len(), self.compose_limit, destination)?;
        let mut inner = self.lock()?;

        let mut data = Vec::new();
        for source in sources {
            let object = inner
                .objects
                .get(source)
                .ok_or_else(|| StorageError::ObjectNotFound(source.clone()))?;
            data.extend_from_slice(&object.data);
        }

        let size = data.len() as u64;
        inner.objects.insert(
            destination.to_string(),
            MemoryObject {
                data,
                content_type: None,
            },
        );
        inner.record_peak();
        Ok(size)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.lock()?.objects.remove(path);
        Ok(())
    }

    async fn set_content_type(&self, path: &str, content_type: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let object = inner
            .objects
            .get_mut(path)
            .ok_or_else(|| StorageError::ObjectNotFound(path.to_string()))?;
        object.content_type = Some(content_type.to_string());
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.lock()?.objects.get(path).map(|o| ObjectMeta {
            size: o.data.len() as u64,
            content_type: o.content_type.clone(),
        }))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.lock()?
            .objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::ObjectNotFound(path.to_string()).into())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
