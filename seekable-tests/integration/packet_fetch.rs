//! Random-access packet retrieval.

use seekable_core::{BridgeError, DemuxBridge, MediaType, SeekFlags, SeekableConfig, SessionHandle};
use seekable_sim::{MockByteSource, SyntheticMedia, simulation_bridge};

const AUDIO_PACKET_SECONDS: f64 = 1024.0 / 44_100.0;

async fn open(media: SyntheticMedia) -> (DemuxBridge, SessionHandle) {
    let bridge = simulation_bridge(SeekableConfig::default());
    let handle = bridge
        .open_default(MockByteSource::new(media.encode()).boxed())
        .await
        .unwrap();
    (bridge, handle)
}

#[tokio::test]
async fn test_audio_packet_at_midpoint() {
    let (bridge, handle) = open(SyntheticMedia::audio_video(10.0)).await;

    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 5.0, SeekFlags::BACKWARD)
        .await
        .unwrap();

    assert_eq!(packet.stream_index, 0);
    assert!(packet.timestamp <= 5.0);
    assert!(5.0 - packet.timestamp < AUDIO_PACKET_SECONDS);
    assert!((packet.duration - AUDIO_PACKET_SECONDS).abs() < 1e-9);
    assert!(packet.keyframe);
    assert_eq!(packet.size, packet.data.len());
    // Payload carries the stream index and sequence number
    assert_eq!(packet.data[0], 0);
    assert_eq!(
        u32::from_le_bytes([packet.data[1], packet.data[2], packet.data[3], packet.data[4]]),
        215
    );
}

#[tokio::test]
async fn test_video_fetch_lands_on_sync_point() {
    let (bridge, handle) = open(SyntheticMedia::audio_video(10.0)).await;

    let packet = bridge
        .fetch_packet(handle, MediaType::Video, None, 3.5, SeekFlags::BACKWARD)
        .await
        .unwrap();

    assert_eq!(packet.stream_index, 1);
    assert!(packet.keyframe);
    assert!((packet.timestamp - 3.0).abs() < 1e-9);
    assert_eq!(packet.size, 2048);
}

#[tokio::test]
async fn test_any_flag_lands_on_exact_frame() {
    let (bridge, handle) = open(SyntheticMedia::audio_video(10.0)).await;

    let flags = SeekFlags::from_bits(SeekFlags::BACKWARD.bits() | SeekFlags::ANY.bits());
    let packet = bridge
        .fetch_packet(handle, MediaType::Video, None, 3.5, flags)
        .await
        .unwrap();

    assert!(!packet.keyframe);
    assert!((packet.timestamp - 3.48).abs() < 1e-9);
    assert_eq!(packet.size, 512);
}

#[tokio::test]
async fn test_explicit_stream_index_is_honoured() {
    let (bridge, handle) = open(SyntheticMedia::audio_video(4.0)).await;

    let packet = bridge
        .fetch_packet(handle, MediaType::Video, Some(1), 2.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    assert_eq!(packet.stream_index, 1);

    // A wanted index of the wrong type matches nothing
    let error = bridge
        .fetch_packet(handle, MediaType::Audio, Some(1), 2.0, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert!(matches!(error, BridgeError::StreamNotFound { .. }));
}

#[tokio::test]
async fn test_missing_stream_type_is_reported() {
    let (bridge, audio_only) = open(SyntheticMedia::audio_only(2.0)).await;
    let error = bridge
        .fetch_packet(audio_only, MediaType::Video, None, 0.0, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        BridgeError::StreamNotFound {
            media_type: MediaType::Video
        }
    ));

    let (bridge, video_only) = open(SyntheticMedia::video_only(2.0)).await;
    let error = bridge
        .fetch_packet(video_only, MediaType::Audio, None, 0.0, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "STREAM_NOT_FOUND");
}

#[tokio::test]
async fn test_forward_seek_past_last_packet_fails() {
    let (bridge, handle) = open(SyntheticMedia::audio_only(2.0)).await;

    let error = bridge
        .fetch_packet(handle, MediaType::Audio, None, 30.0, SeekFlags::NONE)
        .await
        .unwrap_err();

    assert_eq!(error.code(), "SEEK_FAILED");
    // The session stays usable
    assert!(
        bridge
            .fetch_packet(handle, MediaType::Audio, None, 1.0, SeekFlags::BACKWARD)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_repeated_fetches_are_deterministic() {
    let (bridge, handle) = open(SyntheticMedia::audio_video(6.0)).await;

    let mut previous = None;
    for _ in 0..3 {
        let packet = bridge
            .fetch_packet(handle, MediaType::Audio, None, 4.2, SeekFlags::BACKWARD)
            .await
            .unwrap();
        if let Some(previous) = &previous {
            assert_eq!(&packet, previous);
        }
        previous = Some(packet);
    }
}
