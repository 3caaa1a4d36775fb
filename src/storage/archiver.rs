//! Partitioned upload of unbounded streams into a fan-in limited store

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::Result;
use crate::fetcher::MediaSource;
use crate::types::SubscriptionId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The final object produced by [`PartitionedArchiver::archive`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedObject {
    /// Object store path
    pub path: String,
    /// Public URL the object is served at
    pub url: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Content type the object was stored with
    pub content_type: String,
}

/// Streams media into the object store as fixed-size parts and composes them
/// into one object.
///
/// At most `compose_limit` temporary parts are live at any time: before a new
/// part would exceed the limit, all live parts are composed into the first
/// part's name and the others deleted. The operation is not transactional; a
/// crash leaves temporary parts under the scratch prefix.
#[derive(Clone)]
pub struct PartitionedArchiver {
    store: Arc<dyn ObjectStore>,
    scratch_prefix: String,
    media_prefix: String,
    public_base_url: String,
    chunk_size: usize,
}

impl PartitionedArchiver {
    /// Create an archiver over `store` using the layout from `config`
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            scratch_prefix: config.scratch_prefix.trim_matches('/').to_string(),
            media_prefix: config.media_prefix.trim_matches('/').to_string(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Public URL of a stored object
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    /// Prefix holding every media object of one subscription
    pub fn subscription_prefix(&self, owner: &str, id: SubscriptionId) -> String {
        format!(
            "{}/{}/{}/",
            self.media_prefix,
            urlencoding::encode(owner),
            id
        )
    }

    /// Destination path of an entry's media: subscription-scoped and keyed by
    /// the SHA-256 of the canonical link
    pub fn destination_for(&self, owner: &str, id: SubscriptionId, link: &str) -> String {
        let digest = Sha256::digest(link.as_bytes());
        format!("{}{:x}", self.subscription_prefix(owner, id), digest)
    }

    /// Upload `source` to `destination`, returning the final object
    pub async fn archive(&self, source: MediaSource, destination: &str) -> Result<ArchivedObject> {
        let mut parts: Vec<String> = Vec::new();
        match self.upload_parts(source.body, &mut parts).await {
            Ok(()) => {}
            Err(e) => {
                self.discard(&parts).await;
                return Err(e);
            }
        }

        let size_bytes = if parts.is_empty() {
            self.store.put(destination, Vec::new()).await?
        } else {
            let size = self.store.compose(&parts, destination).await?;
            self.delete_parts(&parts).await?;
            size
        };
        self.store
            .set_content_type(destination, &source.mime_type)
            .await?;

        tracing::debug!(
            destination = %destination,
            size_bytes,
            content_type = %source.mime_type,
            "media archived"
        );

        Ok(ArchivedObject {
            path: destination.to_string(),
            url: self.public_url(destination),
            size_bytes,
            content_type: source.mime_type,
        })
    }

    async fn upload_parts(
        &self,
        mut body: Box<dyn crate::fetcher::MediaBody>,
        parts: &mut Vec<String>,
    ) -> Result<()> {
        let mut buffer: Vec<u8> = Vec::with_capacity(self.chunk_size);

        while let Some(chunk) = body.next_chunk().await? {
            let mut rest = chunk.as_slice();
            while !rest.is_empty() {
                let take = (self.chunk_size - buffer.len()).min(rest.len());
                buffer.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                if buffer.len() == self.chunk_size {
                    let full = std::mem::replace(&mut buffer, Vec::with_capacity(self.chunk_size));
                    self.push_part(parts, full).await?;
                }
            }
        }

        if !buffer.is_empty() {
            self.push_part(parts, buffer).await?;
        }
        Ok(())
    }

    async fn push_part(&self, parts: &mut Vec<String>, data: Vec<u8>) -> Result<()> {
        if parts.len() >= self.store.compose_limit() {
            self.reduce(parts).await?;
        }
        let name = format!("{}/{:032x}", self.scratch_prefix, rand::random::<u128>());
        self.store.put(&name, data).await?;
        parts.push(name);
        Ok(())
    }

    /// Compose all live parts into the first one and delete the rest
    async fn reduce(&self, parts: &mut Vec<String>) -> Result<()> {
        let Some(first) = parts.first().cloned() else {
            return Ok(());
        };
        self.store.compose(parts, &first).await?;
        let composed = parts.split_off(1);
        self.delete_parts(&composed).await?;
        tracing::trace!(part = %first, "reduced temporary parts");
        Ok(())
    }

    /// Delete composed parts. On the first failure the remaining parts are
    /// still removed best-effort and that failure is returned.
    async fn delete_parts(&self, parts: &[String]) -> Result<()> {
        for (i, part) in parts.iter().enumerate() {
            if let Err(e) = self.store.delete(part).await {
                tracing::warn!(part = %part, error = %e, "failed to delete temporary part");
                self.discard(&parts[i + 1..]).await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn discard(&self, parts: &[String]) {
        for part in parts {
            if let Err(e) = self.store.delete(part).await {
                tracing::warn!(part = %part, error = %e, "failed to delete temporary part");
            }
        }
    }
}

impl std::fmt::Debug for PartitionedArchiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedArchiver")
            .field("scratch_prefix", &self.scratch_prefix)
            .field("media_prefix", &self.media_prefix)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
