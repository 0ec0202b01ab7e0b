//! Seekable Core - Async byte-source bridge for media container demuxing
//!
//! Lets a pull-based container engine consume bytes, size and seeks from an
//! asynchronous provider (HTTP range requests, chunked file reads, memory),
//! and re-exposes what it finds as a portable schema: container metadata,
//! stream descriptors and decode-ordered packets.
//!
//! The entry point is [`DemuxBridge`], which manages sessions behind opaque
//! handles. [`SeekableMedia`] wraps a single session for the common
//! "load, inspect, stream audio" workflow.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod io;
pub mod media;
pub mod normalize;
pub mod session;
pub mod source;
pub mod stream;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use bridge::DemuxBridge;
pub use config::SeekableConfig;
pub use engine::{ContainerEngine, Demuxer, MediaType, SeekFlags};
pub use error::{BridgeError, BridgeResult};
pub use io::{ByteSource, ByteSourceAdapter, SourceError, Whence};
pub use media::{AudioStream, SeekableMedia};
pub use normalize::{MediaInfo, Packet, StreamDescriptor, Tag};
pub use session::SessionHandle;
pub use source::{FileSource, HttpRangeSource, MemorySource};
pub use stream::{
    ChannelSink, CollectingSink, Delivery, Flow, PacketSink, PacketStream, StopReason,
    StreamRequest, StreamSummary,
};
pub use tracing_setup::{LogLevel, set_log_level};
