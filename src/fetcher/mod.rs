//! Content fetchers: resolve an entry link to a downloadable byte stream
//!
//! A [`ContentFetcher`] turns an entry's canonical link into a [`MediaSource`]:
//! a MIME type, an optional length hint and a chunked body. Fetchers report
//! every failure to obtain a playable representation as
//! [`Error::DownloadUnavailable`](crate::error::Error::DownloadUnavailable).

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;

mod direct;
mod platform;
mod transcode;

pub use direct::DirectFetcher;
pub use platform::{FormatCandidate, PlatformFetcher, AUDIO_FORMATS, VIDEO_FORMATS};
pub use transcode::AudioTranscoder;

/// MIME type used when the upstream does not declare one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A chunked byte stream
#[async_trait]
pub trait MediaBody: Send {
    /// Next chunk of bytes, or `None` once the stream is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// A resolved, downloadable representation of an entry
pub struct MediaSource {
    /// MIME type to store the object with
    pub mime_type: String,
    /// Length announced by the upstream, if any
    pub content_length: Option<u64>,
    /// The byte stream
    pub body: Box<dyn MediaBody>,
}

impl MediaSource {
    /// Build a source over in-memory chunks
    pub fn from_chunks(mime_type: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        let len = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            mime_type: mime_type.into(),
            content_length: Some(len),
            body: Box::new(ChunkedBody::new(chunks)),
        }
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Resolves entry links to media streams
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Resolve a canonical entry link to a downloadable stream
    async fn resolve(&self, link: &str) -> Result<MediaSource>;
}

/// Body over chunks already held in memory
pub struct ChunkedBody {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedBody {
    /// Create a body yielding the given chunks in order
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }
}

#[async_trait]
impl MediaBody for ChunkedBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

/// Body streaming an HTTP response
pub struct ResponseBody {
    response: reqwest::Response,
    link: String,
}

impl ResponseBody {
    /// Wrap a response; `link` is reported in errors
    pub fn new(response: reqwest::Response, link: impl Into<String>) -> Self {
        Self {
            response,
            link: link.into(),
        }
    }
}

#[async_trait]
impl MediaBody for ResponseBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(chunk) => Ok(chunk.map(|bytes| bytes.to_vec())),
            Err(e) => Err(Error::download_unavailable(&self.link, e)),
        }
    }
}

/// Build the HTTP client shared by parsers and fetchers
///
/// Only the connect phase is bounded here; media bodies may stream for longer
/// than `request_timeout`, so listing requests set their own total timeout.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.request_timeout)
        .build()
        .map_err(|e| Error::Config {
            message: format!("failed to build HTTP client: {}", e),
            key: Some("fetch".to_string()),
        })
}

/// MIME type declared by a response, without parameters
pub(crate) fn response_mime_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
