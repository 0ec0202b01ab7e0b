//! HTTP range source against a local server.

use seekable_core::config::HttpConfig;
use seekable_core::{
    ByteSource, CollectingSink, DemuxBridge, HttpRangeSource, MediaType, SeekFlags,
    SeekableConfig, SourceError, StopReason, StreamRequest, Whence,
};
use seekable_sim::{SyntheticMedia, WavFixture, simulation_bridge};

use crate::support::MediaServer;

fn source_for(url: url::Url) -> HttpRangeSource {
    HttpRangeSource::new(url, &HttpConfig::default()).unwrap()
}

#[tokio::test]
async fn test_reads_and_seeks_with_ranges() {
    let data = bytes::Bytes::from((0..=255u8).cycle().take(10_000).collect::<Vec<_>>());
    let server = MediaServer::start(data.clone()).await;
    let mut source = source_for(server.url());

    assert_eq!(source.size().await.unwrap(), Some(10_000));

    let chunk = source.read(100).await.unwrap();
    assert_eq!(chunk, data.slice(0..100));

    assert_eq!(source.seek(5000, Whence::Set).await.unwrap(), 5000);
    let chunk = source.read(16).await.unwrap();
    assert_eq!(chunk, data.slice(5000..5016));

    assert_eq!(source.seek(-10, Whence::End).await.unwrap(), 9990);
    let chunk = source.read(4096).await.unwrap();
    assert_eq!(chunk.len(), 10);

    // End of data reads as empty without another request
    let requests = server.range_requests();
    assert!(source.read(4096).await.unwrap().is_empty());
    assert_eq!(server.range_requests(), requests);
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let server = MediaServer::start(bytes::Bytes::from_static(b"unused")).await;
    let mut source = source_for(server.url_for("/missing"));

    let error = source.read(16).await.unwrap_err();
    assert!(matches!(error, SourceError::NotFound { .. }));
}

#[tokio::test]
async fn test_server_without_ranges_is_rejected() {
    let server = MediaServer::start_without_ranges(WavFixture::new(8000, 1, 1.0).build()).await;
    let mut source = source_for(server.url());

    let error = source.size().await.unwrap_err();
    assert!(matches!(error, SourceError::RangeNotSupported { .. }));
}

#[tokio::test]
async fn test_bridge_over_http() {
    let media = SyntheticMedia::audio_video(4.0);
    let server = MediaServer::start(media.encode()).await;
    let bridge: DemuxBridge = simulation_bridge(SeekableConfig::default());

    let handle = bridge
        .open_default(Box::new(source_for(server.url())))
        .await
        .unwrap();
    let info = bridge.describe(handle).await.unwrap();
    assert_eq!(info.nb_streams, 2);

    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 2.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    assert!(packet.timestamp <= 2.0);

    let mut sink = CollectingSink::new();
    let summary = bridge
        .stream_packets(
            handle,
            StreamRequest::new(MediaType::Video).range(1.0, 2.0),
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(summary.stop_reason, StopReason::RangeEnd);
    assert_eq!(sink.packet_count(), 26);
    assert_eq!(sink.end_markers(), 1);
    assert!(server.range_requests() > 0);
}
