
use crate::config::FetchConfig;
use crate::fetcher::{MediaSource, build_client};

pub(super) fn test_client() -> reqwest::Client {
    build_client(&FetchConfig::default()).unwrap()
}

/// Read a media source to the end
pub(super) async fn drain(mut source: MediaSource) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = source.body.next_chunk().await.unwrap() {
        out.extend_from_slice(&chunk);
    }
    out
}

#[tokio::test]
async fn in_memory_source_reports_length_and_yields_chunks_in_order() {
    let source = MediaSource::from_chunks("audio/mpeg", vec![vec![1, 2], vec![], vec![3]]);
    assert_eq!(source.content_length, Some(3));
    assert_eq!(drain(source).await, [1, 2, 3]);
}
