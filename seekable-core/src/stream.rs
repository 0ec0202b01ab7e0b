//! Bulk packet export with caller-driven backpressure.
//!
//! The streamer hands one packet at a time to a [`PacketSink`] and waits for
//! its answer before reading the next one. The sink's answer is the only way
//! to stop early. Whatever ends the loop, the sink sees exactly one
//! [`Delivery::EndOfStream`] afterwards.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{MediaType, SeekFlags};
use crate::error::BridgeResult;
use crate::fetch::{seek_stream, select_stream};
use crate::normalize::{Packet, normalize_packet};
use crate::session::Session;

/// What the streamer hands to a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Packet(Packet),
    /// Terminal marker; nothing follows it.
    EndOfStream,
}

impl Delivery {
    pub fn is_end(&self) -> bool {
        matches!(self, Delivery::EndOfStream)
    }
}

/// A sink's answer to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Consumer of streamed packets.
#[async_trait]
pub trait PacketSink: Send {
    /// Receives one delivery. Returning [`Flow::Stop`] ends iteration; the
    /// answer to [`Delivery::EndOfStream`] is ignored.
    async fn deliver(&mut self, delivery: Delivery) -> Flow;
}

/// Why a streaming run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A packet past the requested end was read.
    RangeEnd,
    /// The engine ran out of packets.
    Exhausted,
    /// The sink asked to stop.
    SinkStopped,
    /// The engine or byte source failed; treated as end of stream.
    EngineFailure,
}

/// Outcome of a completed streaming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub packets_delivered: u64,
    pub stop_reason: StopReason,
}

/// Parameters of one streaming run.
#[derive(Debug, Clone, Copy)]
pub struct StreamRequest {
    /// Seconds; the stream is only sought when positive.
    pub start: f64,
    /// Seconds; packets stamped later end the run. Ignored unless positive.
    pub end: f64,
    pub media_type: MediaType,
    pub stream: Option<usize>,
    pub seek_flags: SeekFlags,
}

impl StreamRequest {
    /// Whole stream of `media_type`, automatic stream choice.
    pub fn new(media_type: MediaType) -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            media_type,
            stream: None,
            seek_flags: SeekFlags::BACKWARD,
        }
    }

    pub fn range(mut self, start: f64, end: f64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn stream(mut self, stream: Option<usize>) -> Self {
        self.stream = stream;
        self
    }

    pub fn seek_flags(mut self, flags: SeekFlags) -> Self {
        self.seek_flags = flags;
        self
    }
}

/// Streams packets of the selected stream into `sink`.
///
/// # Errors
///
/// - `BridgeError::StreamNotFound` - No stream of the requested type
/// - `BridgeError::Seek` - The initial seek was rejected; nothing was delivered
pub async fn stream_packets(
    session: &mut Session,
    request: StreamRequest,
    sink: &mut dyn PacketSink,
) -> BridgeResult<StreamSummary> {
    let (index, time_base) = select_stream(session, request.media_type, request.stream)?;
    if request.start > 0.0 {
        seek_stream(session, index, time_base, request.start, request.seek_flags).await?;
    }

    let Session {
        demuxer, io, packet, ..
    } = session;
    let mut packets_delivered = 0;

    let stop_reason = loop {
        match demuxer.read_frame(io, packet).await {
            Ok(true) => {}
            Ok(false) => break StopReason::Exhausted,
            Err(e) => {
                warn!("Engine read failed during streaming, ending stream: {}", e);
                break StopReason::EngineFailure;
            }
        }
        if packet.stream_index != index {
            continue;
        }

        let normalized = normalize_packet(packet, time_base);
        packet.unref();
        if request.end > 0.0 && normalized.timestamp > request.end {
            break StopReason::RangeEnd;
        }

        packets_delivered += 1;
        if sink.deliver(Delivery::Packet(normalized)).await == Flow::Stop {
            break StopReason::SinkStopped;
        }
    };

    packet.unref();
    sink.deliver(Delivery::EndOfStream).await;
    debug!(
        "Streamed {} packets from stream {} ({:?})",
        packets_delivered, index, stop_reason
    );

    Ok(StreamSummary {
        packets_delivered,
        stop_reason,
    })
}

/// Forwards deliveries into a bounded channel. A full channel suspends the
/// streamer; a dropped receiver stops it.
pub struct ChannelSink {
    sender: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Delivery>) -> Self {
        Self { sender }
    }

    /// Creates a sink and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl PacketSink for ChannelSink {
    async fn deliver(&mut self, delivery: Delivery) -> Flow {
        match self.sender.send(delivery).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }
}

/// Keeps every delivery in memory, optionally stopping after a number of
/// packets.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub deliveries: Vec<Delivery>,
    stop_after: Option<usize>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers [`Flow::Stop`] once `count` packets have been received.
    pub fn stop_after(count: usize) -> Self {
        Self {
            deliveries: Vec::new(),
            stop_after: Some(count),
        }
    }

    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.deliveries.iter().filter_map(|delivery| match delivery {
            Delivery::Packet(packet) => Some(packet),
            Delivery::EndOfStream => None,
        })
    }

    pub fn packet_count(&self) -> usize {
        self.packets().count()
    }

    pub fn end_markers(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_end()).count()
    }
}

#[async_trait]
impl PacketSink for CollectingSink {
    async fn deliver(&mut self, delivery: Delivery) -> Flow {
        self.deliveries.push(delivery);
        match self.stop_after {
            Some(limit) if self.packet_count() >= limit => Flow::Stop,
            _ => Flow::Continue,
        }
    }
}

/// Packets of a background streaming run as a [`Stream`].
///
/// Ends after the terminal marker. Errors that prevent the run from starting
/// are yielded once before the end.
pub struct PacketStream {
    receiver: mpsc::Receiver<BridgeResult<Packet>>,
}

impl PacketStream {
    pub(crate) fn new(receiver: mpsc::Receiver<BridgeResult<Packet>>) -> Self {
        Self { receiver }
    }
}

impl Stream for PacketStream {
    type Item = BridgeResult<Packet>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Sink feeding a [`PacketStream`]. The terminal marker closes the channel.
pub(crate) struct ResultSink {
    sender: Option<mpsc::Sender<BridgeResult<Packet>>>,
}

impl ResultSink {
    pub(crate) fn new(sender: mpsc::Sender<BridgeResult<Packet>>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Reports a failure that ended the run, if the consumer is still there.
    pub(crate) async fn fail(&mut self, error: crate::error::BridgeError) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(error)).await;
        }
    }
}

#[async_trait]
impl PacketSink for ResultSink {
    async fn deliver(&mut self, delivery: Delivery) -> Flow {
        match delivery {
            Delivery::Packet(packet) => match &self.sender {
                Some(sender) if sender.send(Ok(packet)).await.is_ok() => Flow::Continue,
                _ => Flow::Stop,
            },
            Delivery::EndOfStream => {
                self.sender = None;
                Flow::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn packet(timestamp: f64) -> Packet {
        Packet {
            stream_index: 0,
            keyframe: true,
            timestamp,
            duration: 0.1,
            size: 0,
            data: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_collecting_sink_stops_after_limit() {
        let mut sink = CollectingSink::stop_after(2);

        assert_eq!(sink.deliver(Delivery::Packet(packet(0.0))).await, Flow::Continue);
        assert_eq!(sink.deliver(Delivery::Packet(packet(0.1))).await, Flow::Stop);
        sink.deliver(Delivery::EndOfStream).await;

        assert_eq!(sink.packet_count(), 2);
        assert_eq!(sink.end_markers(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_stops_when_receiver_dropped() {
        let (mut sink, receiver) = ChannelSink::channel(1);
        drop(receiver);

        assert_eq!(sink.deliver(Delivery::Packet(packet(0.0))).await, Flow::Stop);
    }

    #[tokio::test]
    async fn test_channel_sink_applies_backpressure() {
        let (mut sink, mut receiver) = ChannelSink::channel(1);

        assert_eq!(sink.deliver(Delivery::Packet(packet(0.0))).await, Flow::Continue);
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            sink.deliver(Delivery::Packet(packet(0.1))),
        )
        .await;
        assert!(blocked.is_err());

        assert!(matches!(receiver.recv().await, Some(Delivery::Packet(_))));
    }

    #[tokio::test]
    async fn test_result_sink_closes_stream_at_end() {
        let (sender, receiver) = mpsc::channel(4);
        let mut sink = ResultSink::new(sender);
        let mut stream = PacketStream::new(receiver);

        sink.deliver(Delivery::Packet(packet(0.0))).await;
        sink.deliver(Delivery::EndOfStream).await;
        assert_eq!(
            sink.deliver(Delivery::Packet(packet(0.2))).await,
            Flow::Stop
        );

        assert_eq!(stream.next().await.unwrap().unwrap().timestamp, 0.0);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_stream_request_builder() {
        let request = StreamRequest::new(MediaType::Audio)
            .range(1.0, 2.5)
            .stream(Some(3))
            .seek_flags(SeekFlags::ANY);

        assert_eq!(request.start, 1.0);
        assert_eq!(request.end, 2.5);
        assert_eq!(request.stream, Some(3));
        assert_eq!(request.seek_flags, SeekFlags::ANY);
    }
}
