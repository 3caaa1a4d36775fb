//! Video-platform fetcher
//!
//! Resolves a watch link by querying the platform's metadata endpoint for the
//! video id, collecting the advertised representations and picking the first
//! one allowed by the fetcher's format allow-list.

use super::{
    AudioTranscoder, ContentFetcher, DEFAULT_MIME_TYPE, MediaSource, ResponseBody,
    response_mime_type,
};
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Audio-only format ids, most preferred first
pub const AUDIO_FORMATS: &[u32] = &[139, 140, 141];

/// Muxed video format ids, most preferred first
pub const VIDEO_FORMATS: &[u32] = &[18, 22, 37, 43, 44, 45];

/// One representation advertised by the metadata endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCandidate {
    /// Format identifier
    pub itag: u32,
    /// Direct media URL
    pub url: String,
    /// MIME type without codec parameters
    pub mime_type: Option<String>,
}

/// Fetcher for platform watch links
#[derive(Debug, Clone)]
pub struct PlatformFetcher {
    client: reqwest::Client,
    info_template: String,
    allow_list: Vec<u32>,
    transcoder: Option<AudioTranscoder>,
}

impl PlatformFetcher {
    /// Fetcher selecting audio-only representations
    pub fn audio(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self::with_formats(client, config, AUDIO_FORMATS)
    }

    /// Fetcher selecting muxed video representations
    pub fn video(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self::with_formats(client, config, VIDEO_FORMATS)
    }

    /// Fetcher that selects a video representation and extracts its audio track
    pub fn transcoded_audio(
        client: reqwest::Client,
        config: &FetchConfig,
        transcoder: AudioTranscoder,
    ) -> Self {
        let mut fetcher = Self::with_formats(client, config, VIDEO_FORMATS);
        fetcher.transcoder = Some(transcoder);
        fetcher
    }

    /// Fetcher with a custom allow-list
    pub fn with_formats(client: reqwest::Client, config: &FetchConfig, formats: &[u32]) -> Self {
        Self {
            client,
            info_template: config.video_info_template.clone(),
            allow_list: formats.to_vec(),
            transcoder: None,
        }
    }

    /// The allow-list, most preferred first
    pub fn allow_list(&self) -> &[u32] {
        &self.allow_list
    }

    async fn fetch_candidates(&self, link: &str, video_id: &str) -> Result<Vec<FormatCandidate>> {
        let info_url = self
            .info_template
            .replace("{video_id}", &urlencoding::encode(video_id));
        let response = self
            .client
            .get(&info_url)
            .send()
            .await
            .map_err(|e| Error::download_unavailable(link, e))?;
        if !response.status().is_success() {
            return Err(Error::download_unavailable(
                link,
                format!("metadata endpoint returned HTTP {}", response.status()),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::download_unavailable(link, e))?;

        parse_candidates(&body).ok_or_else(|| {
            Error::download_unavailable(link, "metadata has no streaming data")
        })
    }

    async fn open_candidate(&self, candidate: &FormatCandidate) -> Option<MediaSource> {
        let url = match url::Url::parse(&candidate.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(itag = candidate.itag, error = %e, "skipping malformed format URL");
                return None;
            }
        };
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(itag = candidate.itag, status = %r.status(), "skipping unavailable format");
                return None;
            }
            Err(e) => {
                tracing::debug!(itag = candidate.itag, error = %e, "skipping unreachable format");
                return None;
            }
        };

        let mime_type = candidate
            .mime_type
            .clone()
            .or_else(|| response_mime_type(&response))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Some(MediaSource {
            mime_type,
            content_length: response.content_length(),
            body: Box::new(ResponseBody::new(response, candidate.url.clone())),
        })
    }
}

#[async_trait]
impl ContentFetcher for PlatformFetcher {
    async fn resolve(&self, link: &str) -> Result<MediaSource> {
        let video_id = extract_video_id(link)
            .ok_or_else(|| Error::download_unavailable(link, "no video id in link"))?;
        let candidates = self.fetch_candidates(link, &video_id).await?;

        for itag in &self.allow_list {
            for candidate in candidates.iter().filter(|c| c.itag == *itag) {
                if let Some(source) = self.open_candidate(candidate).await {
                    tracing::debug!(link = %link, itag, "selected format");
                    return match &self.transcoder {
                        Some(transcoder) => transcoder.transcode(source, link),
                        None => Ok(source),
                    };
                }
            }
        }

        Err(Error::download_unavailable(
            link,
            format!("no usable format among {:?}", self.allow_list),
        ))
    }
}

/// Video id from a watch link: the `v` query parameter, or the path of a
/// short link (`https://youtu.be/<id>`)
pub(crate) fn extract_video_id(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return Some(v.into_owned()).filter(|v| !v.is_empty());
    }
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()
            .and_then(|mut s| s.next())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }
    None
}

/// Candidates from a metadata response body.
///
/// The body is either the player JSON itself or a url-encoded form carrying it
/// in `player_response`. Returns `None` when no streaming data is present.
pub(crate) fn parse_candidates(body: &str) -> Option<Vec<FormatCandidate>> {
    let player: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let encoded = url::form_urlencoded::parse(body.as_bytes())
                .find(|(k, _)| k == "player_response")?
                .1;
            serde_json::from_str(&encoded).ok()?
        }
    };

    let streaming = player.get("streamingData")?;
    let mut candidates = Vec::new();
    for key in ["formats", "adaptiveFormats"] {
        let Some(list) = streaming.get(key).and_then(Value::as_array) else {
            continue;
        };
        for format in list {
            let Some(itag) = format
                .get("itag")
                .and_then(Value::as_u64)
                .and_then(|i| u32::try_from(i).ok())
            else {
                continue;
            };
            let Some(url) = format.get("url").and_then(Value::as_str) else {
                continue;
            };
            let mime_type = format
                .get("mimeType")
                .and_then(Value::as_str)
                .and_then(|m| m.split(';').next())
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty());
            candidates.push(FormatCandidate {
                itag,
                url: url.to_string(),
                mime_type,
            });
        }
    }
    Some(candidates)
}
