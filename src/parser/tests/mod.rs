use super::*;
use crate::config::Config;
use crate::fetcher::build_client;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Example Show</title>
    <link>https://example.com/show</link>
    <description>Weekly episodes</description>
    <image>
      <url>https://example.com/cover.jpg</url>
      <title>Example Show</title>
      <link>https://example.com/show</link>
    </image>
    <item>
      <title>Episode 2</title>
      <description>Second</description>
      <link>https://example.com/ep2</link>
      <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/ep2.mp3" length="1234" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 1</title>
      <description>First</description>
      <link>https://example.com/ep1</link>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Undated</title>
      <link>https://example.com/undated</link>
    </item>
  </channel>
</rss>"#;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Channel Uploads</title>
  <id>urn:channel:UC123</id>
  <updated>2024-01-03T00:00:00Z</updated>
  <entry>
    <title>Upload A</title>
    <id>urn:video:a</id>
    <link rel="alternate" href="https://www.youtube.com/watch?v=aaa"/>
    <published>2024-01-02T12:00:00Z</published>
    <updated>2024-01-02T13:00:00Z</updated>
    <summary>About A</summary>
  </entry>
  <entry>
    <title>Upload B</title>
    <id>urn:video:b</id>
    <link rel="alternate" href="https://www.youtube.com/watch?v=bbb"/>
    <updated>2024-01-01T08:00:00Z</updated>
  </entry>
</feed>"#;

const EMPTY_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Quiet</title><link>https://q</link><description></description></channel></rss>"#;

fn test_context() -> ParserContext {
    let fetch = FetchConfig {
        request_timeout: Duration::from_secs(5),
        ..FetchConfig::default()
    };
    let retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    ParserContext::new(build_client(&fetch).unwrap(), &fetch, &retry)
}

async fn serve(server: &MockServer, at: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn rss_items_use_enclosure_then_link_and_skip_undated() {
    let listing = parse_feed("https://example.com/feed", RSS_FEED).unwrap();

    assert_eq!(listing.title.as_deref(), Some("Example Show"));
    assert_eq!(listing.description.as_deref(), Some("Weekly episodes"));
    assert_eq!(
        listing.image_url.as_deref(),
        Some("https://example.com/cover.jpg")
    );
    assert_eq!(listing.entries.len(), 2);
    assert_eq!(listing.entries[0].link, "https://cdn.example.com/ep2.mp3");
    assert_eq!(listing.entries[0].published, ts("2024-01-02T10:00:00Z"));
    assert_eq!(listing.entries[1].link, "https://example.com/ep1");
    assert_eq!(listing.entries[1].description, "First");
}

#[test]
fn atom_fallback_prefers_published_over_updated() {
    let listing = parse_feed("https://example.com/atom", ATOM_FEED).unwrap();

    assert_eq!(listing.title.as_deref(), Some("Channel Uploads"));
    assert_eq!(listing.entries.len(), 2);
    assert_eq!(listing.entries[0].link, "https://www.youtube.com/watch?v=aaa");
    assert_eq!(listing.entries[0].published, ts("2024-01-02T12:00:00Z"));
    assert_eq!(listing.entries[0].description, "About A");
    assert_eq!(listing.entries[1].published, ts("2024-01-01T08:00:00Z"));
}

#[test]
fn garbage_is_a_parse_failure() {
    let err = parse_feed("https://example.com/x", "<html><body>nope</body></html>").unwrap_err();
    assert!(matches!(err, Error::ParseFailure { ref url, .. } if url == "https://example.com/x"));
}

#[test]
fn raw_entry_becomes_unarchived_entry_tagged_with_parser() {
    let raw = RawEntry {
        title: "t".into(),
        description: "d".into(),
        link: "https://cdn/e.mp3".into(),
        published: ts("2024-01-01T00:00:00Z"),
    };
    let entry = raw.into_entry(PARSER_RSS);
    assert_eq!(entry.identity().parser, "rss");
    assert_eq!(entry.media_url(), "https://cdn/e.mp3");
    assert!(!entry.is_archived());
}

#[tokio::test]
async fn syndication_parser_fetches_and_parses() {
    let server = MockServer::start().await;
    serve(&server, "/feed.xml", 200, RSS_FEED).await;

    let parser = SyndicationParser::new(test_context());
    let source = Source::new(format!("{}/feed.xml", server.uri()), PARSER_RSS);
    let listing = parser.list_entries(&source).await.unwrap();

    assert_eq!(listing.entries.len(), 2);
}

#[tokio::test]
async fn empty_feed_is_an_empty_listing() {
    let server = MockServer::start().await;
    serve(&server, "/quiet.xml", 200, EMPTY_RSS).await;

    let parser = SyndicationParser::new(test_context());
    let source = Source::new(format!("{}/quiet.xml", server.uri()), PARSER_RSS);
    let listing = parser.list_entries(&source).await.unwrap();

    assert!(listing.entries.is_empty());
    assert_eq!(listing.title.as_deref(), Some("Quiet"));
}

#[tokio::test]
async fn http_error_is_upstream_unavailable() {
    let server = MockServer::start().await;
    serve(&server, "/down.xml", 500, "").await;

    let parser = SyndicationParser::new(test_context());
    let url = format!("{}/down.xml", server.uri());
    let err = parser
        .list_entries(&Source::new(url.clone(), PARSER_RSS))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { url: ref u, .. } if *u == url));
}

#[tokio::test]
async fn non_feed_body_is_parse_failure() {
    let server = MockServer::start().await;
    serve(&server, "/page", 200, "just some text").await;

    let parser = SyndicationParser::new(test_context());
    let source = Source::new(format!("{}/page", server.uri()), PARSER_RSS);
    let err = parser.list_entries(&source).await.unwrap_err();

    assert!(matches!(err, Error::ParseFailure { .. }));
}

#[tokio::test]
async fn channel_parser_resolves_feed_through_channel_id() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/c/example",
        200,
        r#"<html><script>var data = {"externalId":"UC123","other":1};</script></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/feeds/videos.xml"))
        .and(query_param("channel_id", "UC123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
        .mount(&server)
        .await;

    let template = format!("{}/feeds/videos.xml?channel_id={{channel_id}}", server.uri());
    let parser = ChannelParser::new(test_context(), template).unwrap();
    let source = Source::new(format!("{}/c/example", server.uri()), PARSER_YOUTUBE_AUDIO);
    let listing = parser.list_entries(&source).await.unwrap();

    assert_eq!(listing.entries.len(), 2);
    assert_eq!(listing.entries[1].link, "https://www.youtube.com/watch?v=bbb");
}

#[test]
fn channel_id_patterns_are_tried_in_order() {
    let parser = ChannelParser::new(test_context(), "{channel_id}".into()).unwrap();

    assert_eq!(
        parser
            .extract_channel_id(r#"<meta itemprop="x" channel-external-id="UC999">"#)
            .as_deref(),
        Some("UC999")
    );
    assert_eq!(
        parser
            .extract_channel_id(r#"channel-external-id="UC2" ... "externalId":"UC1""#)
            .as_deref(),
        Some("UC1")
    );
    assert!(parser.extract_channel_id("<html></html>").is_none());
    assert_eq!(parser.feed_url("UC 1"), "UC%201");
}

#[tokio::test]
async fn channel_page_without_marker_is_upstream_unavailable() {
    let server = MockServer::start().await;
    serve(&server, "/c/empty", 200, "<html>no ids here</html>").await;

    let parser = ChannelParser::new(test_context(), "{channel_id}".into()).unwrap();
    let source = Source::new(format!("{}/c/empty", server.uri()), PARSER_YOUTUBE_VIDEO);
    let err = parser.list_entries(&source).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { .. }));
}

#[test]
fn standard_registry_binds_three_types() {
    let config = Config::default();
    let registry =
        SourceRegistry::standard(&config, build_client(&config.fetch).unwrap()).unwrap();

    assert_eq!(
        registry.names(),
        vec!["rss", "youtube-audio", "youtube-video"]
    );
    assert_eq!(registry.get("rss").unwrap().display_name, "RSS");
    assert_eq!(
        registry.get(PARSER_YOUTUBE_AUDIO).unwrap().display_name,
        "Youtube Audio"
    );
    assert!(registry.parser(PARSER_YOUTUBE_VIDEO).is_ok());
    assert!(matches!(
        registry.fetcher("podcast-index"),
        Err(Error::Validation(_))
    ));
    assert!(!registry.contains("podcast-index"));
}
