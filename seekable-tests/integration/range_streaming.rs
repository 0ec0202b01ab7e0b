//! Range streaming: end bound, single end marker and sink-driven stop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use proptest::prelude::*;
use seekable_core::{
    ChannelSink, CollectingSink, Delivery, DemuxBridge, Flow, MediaType, PacketSink, SeekFlags,
    SeekableConfig, SessionHandle, StopReason, StreamRequest,
};
use seekable_sim::{MockByteSource, SyntheticMedia, simulation_bridge};

use crate::support::small_buffer_config;

async fn open_synthetic(seconds: f64) -> (DemuxBridge, SessionHandle) {
    let bridge = simulation_bridge(SeekableConfig::default());
    let handle = bridge
        .open_default(MockByteSource::new(SyntheticMedia::audio_video(seconds).encode()).boxed())
        .await
        .unwrap();
    (bridge, handle)
}

#[tokio::test]
async fn test_range_never_passes_end() {
    let (bridge, handle) = open_synthetic(10.0).await;
    let mut sink = CollectingSink::new();

    let summary = bridge
        .stream_packets(
            handle,
            StreamRequest::new(MediaType::Audio).range(2.0, 4.0),
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::RangeEnd);
    assert_eq!(sink.end_markers(), 1);
    assert!(sink.deliveries.last().unwrap().is_end());
    assert!(sink.packet_count() > 0);
    assert_eq!(summary.packets_delivered as usize, sink.packet_count());

    let timestamps = sink.packets().map(|p| p.timestamp).collect::<Vec<_>>();
    assert!(timestamps.iter().all(|&ts| ts <= 4.0));
    assert!(timestamps[0] <= 2.0);
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(sink.packets().all(|p| p.stream_index == 0));
}

#[tokio::test]
async fn test_whole_stream_until_exhausted() {
    let (bridge, handle) = open_synthetic(3.0).await;
    let mut sink = CollectingSink::new();

    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Video), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(sink.packet_count(), 75);
    assert_eq!(sink.end_markers(), 1);
    assert_eq!(sink.packets().filter(|p| p.keyframe).count(), 3);
}

#[tokio::test]
async fn test_zero_start_does_not_seek() {
    let data = SyntheticMedia::audio_only(2.0).encode();
    let source = MockByteSource::new(data);
    let bridge = simulation_bridge(SeekableConfig::default());
    let handle = bridge.open_default(source.boxed()).await.unwrap();

    // Leave the read position somewhere in the middle
    bridge
        .fetch_packet(handle, MediaType::Audio, None, 1.0, SeekFlags::BACKWARD)
        .await
        .unwrap();

    let mut sink = CollectingSink::new();
    bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    // Streaming resumed right after the fetched packet instead of rewinding
    let first = sink.packets().next().unwrap();
    assert!(first.timestamp > 1.0);
}

#[tokio::test]
async fn test_stop_after_first_packet_reads_no_further() {
    let bridge = simulation_bridge(small_buffer_config());
    let media = SyntheticMedia::audio_only(10.0).encode();
    let source = MockByteSource::new(media.clone());
    let handle = bridge.open_default(source.boxed()).await.unwrap();
    source.reset();

    let mut sink = CollectingSink::stop_after(1);
    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::SinkStopped);
    assert_eq!(summary.packets_delivered, 1);
    assert_eq!(sink.deliveries.len(), 2);
    assert!(sink.deliveries[1].is_end());
    // One small packet needs at most two buffer fills
    assert!(source.read_count() <= 2);
    assert!(source.bytes_served() <= 2 * 4096);
    assert!((source.bytes_served() as usize) < media.len());
}

/// Sink that stops when it sees a packet at or past a timestamp.
struct StopAt {
    limit: f64,
    seen: Vec<f64>,
    end_markers: usize,
}

#[async_trait]
impl PacketSink for StopAt {
    async fn deliver(&mut self, delivery: Delivery) -> Flow {
        match delivery {
            Delivery::Packet(packet) => {
                self.seen.push(packet.timestamp);
                if packet.timestamp >= self.limit {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
            Delivery::EndOfStream => {
                self.end_markers += 1;
                Flow::Continue
            }
        }
    }
}

#[tokio::test]
async fn test_custom_sink_controls_the_stop() {
    let (bridge, handle) = open_synthetic(5.0).await;
    let mut sink = StopAt {
        limit: 0.98,
        seen: Vec::new(),
        end_markers: 0,
    };

    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Video), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::SinkStopped);
    assert_eq!(sink.seen.len(), 26);
    assert_eq!(sink.end_markers, 1);
}

#[tokio::test]
async fn test_channel_sink_applies_backpressure() {
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let handle = bridge
        .open_default(MockByteSource::new(SyntheticMedia::audio_only(2.0).encode()).boxed())
        .await
        .unwrap();

    let (mut sink, mut receiver) = ChannelSink::channel(1);
    let streamer = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
                .await
        })
    };

    let mut packets = 0;
    let mut ends = 0;
    while let Some(delivery) = receiver.recv().await {
        match delivery {
            Delivery::Packet(_) => packets += 1,
            Delivery::EndOfStream => ends += 1,
        }
        tokio::task::yield_now().await;
    }

    let summary = streamer.await.unwrap().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(packets, 87);
    assert_eq!(ends, 1);
}

#[tokio::test]
async fn test_dropped_receiver_stops_streaming() {
    let (bridge, handle) = open_synthetic(5.0).await;
    let (mut sink, receiver) = ChannelSink::channel(4);
    drop(receiver);

    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::SinkStopped);
    assert_eq!(summary.packets_delivered, 1);
}

#[tokio::test]
async fn test_concurrent_stream_and_fetch_on_one_handle_serialize() {
    let bridge = Arc::new(simulation_bridge(SeekableConfig::default()));
    let handle = bridge
        .open_default(MockByteSource::new(SyntheticMedia::audio_video(4.0).encode()).boxed())
        .await
        .unwrap();

    let (mut sink, receiver) = ChannelSink::channel(8);
    let streamer = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .stream_packets(
                    handle,
                    StreamRequest::new(MediaType::Audio).range(1.0, 3.0),
                    &mut sink,
                )
                .await
        })
    };
    let fetcher = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .fetch_packet(handle, MediaType::Video, None, 2.0, SeekFlags::BACKWARD)
                .await
        })
    };

    let deliveries = tokio_stream_of(receiver).collect::<Vec<_>>().await;
    let summary = streamer.await.unwrap().unwrap();
    let packet = fetcher.await.unwrap().unwrap();

    assert_eq!(summary.stop_reason, StopReason::RangeEnd);
    assert_eq!(deliveries.iter().filter(|d| d.is_end()).count(), 1);
    assert!(deliveries.iter().all(|d| match d {
        Delivery::Packet(p) => p.stream_index == 0 && p.timestamp <= 3.0,
        Delivery::EndOfStream => true,
    }));
    assert_eq!(packet.stream_index, 1);
    assert!((packet.timestamp - 2.0).abs() < 1e-9);
}

fn tokio_stream_of(
    mut receiver: tokio::sync::mpsc::Receiver<Delivery>,
) -> impl futures::Stream<Item = Delivery> {
    futures::stream::poll_fn(move |cx| receiver.poll_recv(cx))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_range_stream_respects_end(start in 0.0f64..6.0, length in 0.1f64..4.0) {
        let end = start + length;
        let (timestamps, end_markers, stop_reason) = tokio_test::block_on(async {
            let (bridge, handle) = open_synthetic(8.0).await;
            let mut sink = CollectingSink::new();
            let summary = bridge
                .stream_packets(
                    handle,
                    StreamRequest::new(MediaType::Audio).range(start, end),
                    &mut sink,
                )
                .await
                .unwrap();
            let timestamps = sink.packets().map(|p| p.timestamp).collect::<Vec<_>>();
            (timestamps, sink.end_markers(), summary.stop_reason)
        });

        prop_assert_eq!(end_markers, 1);
        prop_assert!(timestamps.iter().all(|&ts| ts <= end));
        prop_assert!(!timestamps.is_empty());
        // Target rounding to the stream clock can land half a tick past start
        prop_assert!(timestamps[0] <= start + 1e-4);
        prop_assert!(matches!(stop_reason, StopReason::RangeEnd | StopReason::Exhausted));
    }
}
