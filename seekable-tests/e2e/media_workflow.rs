//! Host workflows through the single-source facade.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use seekable_core::{BridgeError, MediaType, SeekableConfig, SeekableMedia};
use seekable_sim::{SyntheticMedia, WavFixture, simulation_bridge};
use tempfile::NamedTempFile;

use crate::support::MediaServer;

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_local_file_workflow() {
    let fixture = WavFixture::new(16_000, 1, 4.0).with_info(*b"INAM", "Workflow");
    let file = write_temp(&fixture.build());
    let mut media = SeekableMedia::new(SeekableConfig::default());

    media.load_file(file.path(), Some(8192)).await.unwrap();
    assert!(media.is_loaded());

    let info = media.media_info().await.unwrap();
    assert_eq!(info.format_name, "wav");
    assert!((info.duration - 4.0).abs() < 1e-6);
    assert_eq!(info.streams[0].tags["title"], "Workflow");

    let packet = media.packet_at(2.5).await.unwrap();
    assert!((packet.timestamp - 2.5).abs() < 1e-9);

    let mut stream = media.audio_stream(1.0, 3.0).await.unwrap();
    assert_eq!(stream.mime_type, "audio/wav");

    let mut timestamps = Vec::new();
    while let Some(packet) = stream.packets.next().await {
        timestamps.push(packet.unwrap().timestamp);
    }
    assert!(!timestamps.is_empty());
    assert!((timestamps[0] - 1.0).abs() < 1e-9);
    assert!(timestamps.iter().all(|&ts| ts <= 3.0));

    media.destroy();
    assert!(!media.is_loaded());
    assert!(matches!(
        media.media_info().await,
        Err(BridgeError::NotLoaded)
    ));
}

#[tokio::test]
async fn test_remote_workflow() {
    let server = MediaServer::start(SyntheticMedia::audio_video(6.0).encode()).await;
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let mut media = SeekableMedia::with_bridge(Arc::clone(&bridge));

    media.load_url(server.url().as_str(), None).await.unwrap();

    let info = media.media_info().await.unwrap();
    assert_eq!(info.nb_streams, 2);
    assert_eq!(
        info.first_stream_of(MediaType::Audio).unwrap().codec_string,
        "mp4a.40.2"
    );

    let stream = media.audio_stream(2.0, 4.0).await.unwrap();
    assert_eq!(stream.mime_type, "audio/aac");
    let packets = stream
        .packets
        .map(|packet| packet.unwrap())
        .collect::<Vec<_>>()
        .await;

    assert!(packets.iter().all(|p| p.stream_index == 0 && p.timestamp <= 4.0));
    // 2 seconds of 1024-sample packets at 44.1 kHz, plus the one before the start
    assert!(packets.len() >= 86 && packets.len() <= 88);
    assert!(server.range_requests() > 0);
}

#[tokio::test]
async fn test_stream_without_audio_reports_error() {
    let file = write_temp(&SyntheticMedia::video_only(2.0).encode());
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let mut media = SeekableMedia::with_bridge(bridge);
    media.load_file(file.path(), None).await.unwrap();

    let stream = media.audio_stream(0.0, 0.0).await.unwrap();
    assert_eq!(stream.mime_type, "application/octet-stream");

    let items = stream.packets.collect::<Vec<_>>().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(BridgeError::StreamNotFound {
            media_type: MediaType::Audio
        })
    ));
}

#[tokio::test]
async fn test_reload_replaces_previous_session() {
    let first = write_temp(&WavFixture::new(8000, 1, 1.0).build());
    let second = write_temp(&WavFixture::new(8000, 2, 2.0).build());
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let mut media = SeekableMedia::with_bridge(Arc::clone(&bridge));

    media.load_file(first.path(), None).await.unwrap();
    let first_handle = media.handle().unwrap();
    media.load_file(second.path(), None).await.unwrap();

    assert_eq!(bridge.session_count(), 1);
    assert!(bridge.describe(first_handle).await.is_err());
    assert_eq!(media.media_info().await.unwrap().streams[0].channels, 2);

    drop(media);
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn test_load_failures() {
    let mut media = SeekableMedia::default();

    let error = media.load_url("not a url", None).await.unwrap_err();
    assert_eq!(error.code(), "IO_ERROR");

    let dir = tempfile::tempdir().unwrap();
    let error = media
        .load_file(dir.path().join("absent.wav"), None)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "IO_ERROR");

    let garbage = write_temp(&[0u8; 4096]);
    let error = media.load_file(garbage.path(), None).await.unwrap_err();
    assert_eq!(error.code(), "SOURCE_OPEN_FAILED");
    assert!(!media.is_loaded());
}

#[tokio::test]
async fn test_whole_file_export() {
    let file = write_temp(&WavFixture::new(8000, 1, 2.0).build());
    let mut media = SeekableMedia::new(SeekableConfig::default());
    media.load_file(file.path(), None).await.unwrap();

    let stream = media.audio_stream(0.0, 0.0).await.unwrap();
    let bytes: usize = stream
        .packets
        .map(|packet| packet.map(|p| p.size).unwrap_or(0))
        .fold(0, |sum, size| async move { sum + size })
        .await;

    assert_eq!(bytes, 32_000);
}
