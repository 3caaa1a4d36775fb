//! Registry of source types keyed by parser name

use super::{
    ChannelParser, PARSER_RSS, PARSER_YOUTUBE_AUDIO, PARSER_YOUTUBE_VIDEO, ParserContext,
    SourceParser, SyndicationParser,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{AudioTranscoder, ContentFetcher, DirectFetcher, PlatformFetcher};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registered source type: its parser, its fetcher and a display name
#[derive(Clone)]
pub struct SourceType {
    /// Registry key, stored on sources and entries
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Listing parser
    pub parser: Arc<dyn SourceParser>,
    /// Media fetcher for this type's entries
    pub fetcher: Arc<dyn ContentFetcher>,
}

impl std::fmt::Debug for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceType")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Source types keyed by parser name
#[derive(Clone, Debug, Default)]
pub struct SourceRegistry {
    types: BTreeMap<String, SourceType>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: `rss`, `youtube-audio` and `youtube-video`
    pub fn standard(config: &Config, client: reqwest::Client) -> Result<Self> {
        let ctx = ParserContext::new(client.clone(), &config.fetch, &config.retry);
        let syndication: Arc<dyn SourceParser> = Arc::new(SyndicationParser::new(ctx.clone()));
        let channel: Arc<dyn SourceParser> = Arc::new(ChannelParser::new(
            ctx,
            config.fetch.channel_feed_template.clone(),
        )?);

        let audio_fetcher: Arc<dyn ContentFetcher> = if config.fetch.transcode_audio {
            match AudioTranscoder::locate(config.fetch.ffmpeg_path.clone()) {
                Some(transcoder) => Arc::new(PlatformFetcher::transcoded_audio(
                    client.clone(),
                    &config.fetch,
                    transcoder,
                )),
                None => {
                    tracing::warn!("ffmpeg not found, selecting audio-only formats instead");
                    Arc::new(PlatformFetcher::audio(client.clone(), &config.fetch))
                }
            }
        } else {
            Arc::new(PlatformFetcher::audio(client.clone(), &config.fetch))
        };

        let mut registry = Self::new();
        registry.register(
            PARSER_RSS,
            "RSS",
            syndication,
            Arc::new(DirectFetcher::new(client.clone())),
        );
        registry.register(
            PARSER_YOUTUBE_VIDEO,
            "Youtube Video",
            channel.clone(),
            Arc::new(PlatformFetcher::video(client, &config.fetch)),
        );
        registry.register(PARSER_YOUTUBE_AUDIO, "Youtube Audio", channel, audio_fetcher);
        Ok(registry)
    }

    /// Register (or replace) a source type
    pub fn register(
        &mut self,
        name: impl Into<String>,
        display_name: impl Into<String>,
        parser: Arc<dyn SourceParser>,
        fetcher: Arc<dyn ContentFetcher>,
    ) {
        let name = name.into();
        self.types.insert(
            name.clone(),
            SourceType {
                name,
                display_name: display_name.into(),
                parser,
                fetcher,
            },
        );
    }

    /// Look up a source type
    pub fn get(&self, name: &str) -> Option<&SourceType> {
        self.types.get(name)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered source types, sorted by name
    pub fn types(&self) -> impl Iterator<Item = &SourceType> {
        self.types.values()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Parser for `name`, or a validation error
    pub fn parser(&self, name: &str) -> Result<Arc<dyn SourceParser>> {
        self.require(name).map(|t| t.parser.clone())
    }

    /// Fetcher for `name`, or a validation error
    pub fn fetcher(&self, name: &str) -> Result<Arc<dyn ContentFetcher>> {
        self.require(name).map(|t| t.fetcher.clone())
    }

    fn require(&self, name: &str) -> Result<&SourceType> {
        self.types
            .get(name)
            .ok_or_else(|| Error::Validation(format!("unknown parser type: {}", name)))
    }
}
