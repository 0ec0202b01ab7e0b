//! Session lifecycle through the bridge: open, describe, close and stale
//! handle rejection.

use std::sync::Arc;

use bytes::Bytes;
use seekable_core::{
    BridgeError, CollectingSink, MediaType, SeekFlags, SeekableConfig, SessionHandle, StreamRequest,
};
use seekable_sim::{MockByteSource, SyntheticMedia, WavFixture, simulation_bridge};

#[tokio::test]
async fn test_closed_handle_is_rejected_everywhere() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let media = SyntheticMedia::audio_video(2.0).encode();
    let handle = bridge
        .open_default(MockByteSource::new(media).boxed())
        .await
        .unwrap();
    assert_eq!(bridge.session_count(), 1);

    bridge.close(handle);
    assert_eq!(bridge.session_count(), 0);

    let describe = bridge.describe(handle).await;
    assert!(matches!(describe, Err(BridgeError::InvalidHandle { .. })));

    let fetch = bridge
        .fetch_packet(handle, MediaType::Audio, None, 0.0, SeekFlags::BACKWARD)
        .await;
    assert!(matches!(fetch, Err(BridgeError::InvalidHandle { .. })));

    let mut sink = CollectingSink::new();
    let stream = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await;
    assert!(matches!(stream, Err(BridgeError::InvalidHandle { .. })));
    assert!(sink.deliveries.is_empty());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let handle = bridge
        .open_default(MockByteSource::new(WavFixture::new(8000, 1, 1.0).build()).boxed())
        .await
        .unwrap();

    bridge.close(handle);
    bridge.close(handle);
    bridge.close(SessionHandle::from_raw(u64::MAX));
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn test_reused_slot_does_not_revive_old_handle() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let wav = WavFixture::new(8000, 1, 1.0).build();

    let first = bridge
        .open_default(MockByteSource::new(wav.clone()).boxed())
        .await
        .unwrap();
    bridge.close(first);
    let second = bridge
        .open_default(MockByteSource::new(wav).boxed())
        .await
        .unwrap();

    assert_ne!(first, second);
    assert!(bridge.describe(second).await.is_ok());
    assert!(matches!(
        bridge.describe(first).await,
        Err(BridgeError::InvalidHandle { .. })
    ));

    // Raw values survive a trip through a host that stores plain integers
    let restored = SessionHandle::from_raw(second.as_raw());
    assert_eq!(bridge.describe(restored).await.unwrap().format_name, "wav");
}

#[tokio::test]
async fn test_unrecognised_source_fails_to_open() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let garbage = Bytes::from(vec![0x5a; 8192]);

    let error = bridge
        .open_default(MockByteSource::new(garbage).boxed())
        .await
        .unwrap_err();

    assert_eq!(error.code(), "SOURCE_OPEN_FAILED");
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let media = SyntheticMedia::audio_video(3.0).encode();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let handle = bridge
            .open_default(MockByteSource::new(media.clone()).boxed())
            .await
            .unwrap();
        handles.push(handle);
    }

    let tasks = handles
        .iter()
        .enumerate()
        .map(|(i, &handle)| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                let at = 0.5 * i as f64;
                bridge
                    .fetch_packet(handle, MediaType::Audio, None, at, SeekFlags::BACKWARD)
                    .await
                    .map(|packet| (at, packet))
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        let (at, packet) = task.await.unwrap().unwrap();
        assert_eq!(packet.stream_index, 0);
        assert!(packet.timestamp <= at + 1e-9);
        assert!(at - packet.timestamp < 1024.0 / 44_100.0 + 1e-9);
    }

    // Closing one session leaves the rest untouched
    bridge.close(handles[0]);
    for &handle in &handles[1..] {
        assert_eq!(bridge.describe(handle).await.unwrap().nb_streams, 2);
    }
}

#[tokio::test]
async fn test_packets_outlive_their_session() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let handle = bridge
        .open_default(MockByteSource::new(SyntheticMedia::audio_only(1.0).encode()).boxed())
        .await
        .unwrap();

    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 0.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    bridge.close(handle);

    assert_eq!(packet.size, 256);
    assert_eq!(packet.data.len(), 256);
    assert_eq!(packet.data[0], 0);
}
