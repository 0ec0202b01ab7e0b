//! Byte source failures surfacing through the bridge.

use std::time::Duration;

use async_trait::async_trait;
use seekable_core::{
    BridgeError, CollectingSink, Delivery, DemuxBridge, Flow, MediaType, PacketSink, SeekFlags,
    SessionHandle, StopReason, StreamRequest,
};
use seekable_sim::{MockByteSource, SyntheticMedia, WavFixture, simulation_bridge};

use crate::support::small_buffer_config;

async fn open_wav(seconds: f64) -> (DemuxBridge, SessionHandle, MockByteSource) {
    let bridge = simulation_bridge(small_buffer_config());
    let source = MockByteSource::new(WavFixture::new(8000, 1, seconds).build());
    let handle = bridge.open_default(source.boxed()).await.unwrap();
    (bridge, handle, source)
}

/// Arms a read failure on the source once the first packet arrives.
struct FailAfterFirst {
    source: MockByteSource,
    inner: CollectingSink,
}

#[async_trait]
impl PacketSink for FailAfterFirst {
    async fn deliver(&mut self, delivery: Delivery) -> Flow {
        if matches!(delivery, Delivery::Packet(_)) && self.inner.packet_count() == 0 {
            self.source.fail_next_read();
        }
        self.inner.deliver(delivery).await
    }
}

#[tokio::test]
async fn test_read_failure_mid_stream_ends_with_marker() {
    let bridge = simulation_bridge(small_buffer_config());
    let source = MockByteSource::new(SyntheticMedia::audio_only(10.0).encode());
    let handle = bridge.open_default(source.boxed()).await.unwrap();
    let mut sink = FailAfterFirst {
        source: source.clone(),
        inner: CollectingSink::new(),
    };

    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    // Packets already buffered still go out before the failure surfaces
    assert_eq!(summary.stop_reason, StopReason::EngineFailure);
    assert!(summary.packets_delivered >= 1);
    assert_eq!(sink.inner.packet_count() as u64, summary.packets_delivered);
    assert_eq!(sink.inner.end_markers(), 1);
    assert!(sink.inner.deliveries.last().unwrap().is_end());

    // The session recovers once the source does
    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 0.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    assert_eq!(packet.timestamp, 0.0);
}

#[tokio::test]
async fn test_read_failure_during_fetch_is_io_error() {
    let (bridge, handle, source) = open_wav(10.0).await;
    source.fail_next_read();

    let error = bridge
        .fetch_packet(handle, MediaType::Audio, None, 5.0, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert!(matches!(error, BridgeError::Io(_)));
    assert_eq!(error.code(), "IO_ERROR");

    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 5.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    assert!((packet.timestamp - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_read_failure_during_open_is_io_error() {
    let bridge = simulation_bridge(small_buffer_config());
    let source = MockByteSource::new(SyntheticMedia::audio_video(1.0).encode());
    source.fail_next_read();

    let error = bridge.open_default(source.boxed()).await.unwrap_err();

    assert_eq!(error.code(), "IO_ERROR");
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn test_seek_failure_before_streaming_delivers_nothing() {
    let (bridge, handle, source) = open_wav(10.0).await;
    source.fail_next_seek();

    let mut sink = CollectingSink::new();
    let error = bridge
        .stream_packets(
            handle,
            StreamRequest::new(MediaType::Audio).range(5.0, 6.0),
            &mut sink,
        )
        .await
        .unwrap_err();

    assert_eq!(error.code(), "SEEK_FAILED");
    assert!(sink.deliveries.is_empty());
}

#[tokio::test]
async fn test_short_reads_do_not_change_packets() {
    let media = SyntheticMedia::audio_video(3.0).encode();
    let bridge = simulation_bridge(small_buffer_config());

    let whole = bridge
        .open_default(MockByteSource::new(media.clone()).boxed())
        .await
        .unwrap();
    let trickle_source = MockByteSource::new(media).with_max_chunk(7);
    let trickle = bridge.open_default(trickle_source.boxed()).await.unwrap();

    let mut expected = CollectingSink::new();
    let mut actual = CollectingSink::new();
    let request = StreamRequest::new(MediaType::Audio).range(0.5, 2.5);
    bridge
        .stream_packets(whole, request, &mut expected)
        .await
        .unwrap();
    bridge
        .stream_packets(trickle, request, &mut actual)
        .await
        .unwrap();

    assert_eq!(expected.deliveries, actual.deliveries);
    assert!(trickle_source.read_count() > 100);
}

#[tokio::test]
async fn test_slow_source_still_streams() {
    let bridge = simulation_bridge(small_buffer_config());
    let source = MockByteSource::new(WavFixture::new(8000, 1, 1.0).build())
        .with_read_delay(Duration::from_millis(1));
    let handle = bridge.open_default(source.boxed()).await.unwrap();

    let mut sink = CollectingSink::new();
    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    let total: usize = sink.packets().map(|p| p.size).sum();
    assert_eq!(total, 16000);
}
