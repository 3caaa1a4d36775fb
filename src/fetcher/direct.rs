//! Plain HTTP passthrough fetcher

use super::{ContentFetcher, DEFAULT_MIME_TYPE, MediaSource, ResponseBody, response_mime_type};
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Downloads the entry link as-is (RSS enclosures)
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: reqwest::Client,
}

impl DirectFetcher {
    /// Create a fetcher using `client`
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for DirectFetcher {
    async fn resolve(&self, link: &str) -> Result<MediaSource> {
        let url = url::Url::parse(link).map_err(|e| Error::download_unavailable(link, e))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download_unavailable(link, e))?;

        if !response.status().is_success() {
            return Err(Error::download_unavailable(
                link,
                format!("HTTP {}", response.status()),
            ));
        }

        let mime_type =
            response_mime_type(&response).unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Ok(MediaSource {
            mime_type,
            content_length: response.content_length(),
            body: Box::new(ResponseBody::new(response, link)),
        })
    }
}
