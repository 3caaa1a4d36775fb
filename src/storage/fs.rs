//! Directory-backed object store

use super::{ObjectMeta, ObjectStore, check_fan_in, validate_path};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const META_DIR: &str = ".meta";
const STAGING_DIR: &str = ".staging";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: Option<String>,
}

/// Object store rooted at a local directory
///
/// Objects are plain files under the root. Content types live in JSON sidecars
/// under `.meta/`, and compose writes into `.staging/` before renaming onto the
/// destination, so a destination that is also a source is read completely
/// before it is replaced.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    compose_limit: usize,
}

impl FsObjectStore {
    /// Open (and create) a store rooted at `root`
    pub async fn new(root: impl Into<PathBuf>, compose_limit: usize) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(META_DIR)).await?;
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self {
            root,
            compose_limit,
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }

    fn sidecar_path(&self, path: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{}.json", path))
    }

    fn backend_error(path: &str, e: impl std::fmt::Display) -> crate::error::Error {
        StorageError::Backend {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    }

    async fn ensure_parent(file: &Path) -> Result<()> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_sidecar(&self, path: &str) -> Sidecar {
        match fs::read(self.sidecar_path(path)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Sidecar::default(),
        }
    }

    async fn remove_sidecar(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.sidecar_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::backend_error(path, e)),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn compose_limit(&self) -> usize {
        self.compose_limit
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        let file = self.object_path(path)?;
        Self::ensure_parent(&file).await?;
        let size = data.len() as u64;
        fs::write(&file, data)
            .await
            .map_err(|e| Self::backend_error(path, e))?;
        self.remove_sidecar(path).await?;
        Ok(size)
    }

    async fn compose(&self, sources: &[String], destination: &str) -> Result<u64> {
        let dest_file = self.object_path(destination)?;
        check_fan_in(sources.len(), self.compose_limit, destination)?;

        let staging = self
            .root
            .join(STAGING_DIR)
            .join(format!("{:032x}", rand::random::<u128>()));
        let mut out = fs::File::create(&staging)
            .await
            .map_err(|e| Self::backend_error(destination, e))?;

        let mut size = 0u64;
        for source in sources {
            let source_file = self.object_path(source)?;
            let mut input = match fs::File::open(&source_file).await {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    drop(out);
                    let _ = fs::remove_file(&staging).await;
                    return Err(StorageError::ObjectNotFound(source.clone()).into());
                }
                Err(e) => return Err(Self::backend_error(source, e)),
            };
            size += tokio::io::copy(&mut input, &mut out)
                .await
                .map_err(|e| Self::backend_error(source, e))?;
        }
        out.flush()
            .await
            .map_err(|e| Self::backend_error(destination, e))?;
        drop(out);

        Self::ensure_parent(&dest_file).await?;
        fs::rename(&staging, &dest_file)
            .await
            .map_err(|e| Self::backend_error(destination, e))?;
        self.remove_sidecar(destination).await?;
        Ok(size)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let file = self.object_path(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Self::backend_error(path, e)),
        }
        self.remove_sidecar(path).await
    }

    async fn set_content_type(&self, path: &str, content_type: &str) -> Result<()> {
        let file = self.object_path(path)?;
        if fs::metadata(&file).await.is_err() {
            return Err(StorageError::ObjectNotFound(path.to_string()).into());
        }
        let sidecar = self.sidecar_path(path);
        Self::ensure_parent(&sidecar).await?;
        let body = serde_json::to_vec(&Sidecar {
            content_type: Some(content_type.to_string()),
        })?;
        fs::write(&sidecar, body)
            .await
            .map_err(|e| Self::backend_error(path, e))
    }

    async fn stat(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let file = self.object_path(path)?;
        match fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectMeta {
                size: meta.len(),
                content_type: self.read_sidecar(path).await.content_type,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::backend_error(path, e)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.object_path(path)?;
        match fs::read(&file).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(path.to_string()).into())
            }
            Err(e) => Err(Self::backend_error(path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::backend_error(prefix, e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    found.push(key);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}
