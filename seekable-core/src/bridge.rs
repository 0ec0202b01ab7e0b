//! Handle-based boundary between hosts and the demuxing engines.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SeekableConfig;
use crate::engine::{ContainerEngine, MediaType, SeekFlags, default_engines};
use crate::error::{BridgeError, BridgeResult};
use crate::fetch;
use crate::io::ByteSource;
use crate::normalize::{MediaInfo, Packet, describe};
use crate::session::{Session, SessionHandle, SessionRegistry};
use crate::stream::{self, PacketSink, StreamRequest, StreamSummary};

/// Owns the registered engines and every open session.
///
/// Operations on one handle run one at a time; operations on different
/// handles are independent.
pub struct DemuxBridge {
    engines: Vec<Arc<dyn ContainerEngine>>,
    sessions: SessionRegistry<Session>,
    config: SeekableConfig,
}

impl DemuxBridge {
    /// Bridge with the built-in engines.
    pub fn new(config: SeekableConfig) -> Self {
        Self::with_engines(default_engines(), config)
    }

    pub fn with_engines(engines: Vec<Arc<dyn ContainerEngine>>, config: SeekableConfig) -> Self {
        Self {
            engines,
            sessions: SessionRegistry::new(),
            config,
        }
    }

    /// Adds an engine after the existing ones. It wins ties only against
    /// engines registered later.
    pub fn register_engine(&mut self, engine: Arc<dyn ContainerEngine>) {
        self.engines.push(engine);
    }

    pub fn config(&self) -> &SeekableConfig {
        &self.config
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Opens `source` with a working buffer of `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Open` - Unrecognised or malformed container
    /// - `BridgeError::Io` - The byte source failed
    pub async fn open(
        &self,
        source: Box<dyn ByteSource>,
        buffer_size: usize,
    ) -> BridgeResult<SessionHandle> {
        let session =
            Session::open(&self.engines, source, buffer_size, self.config.io.probe_size).await?;
        let engine = session.engine_name();
        let handle = self.sessions.insert(session);
        info!("Opened session {} ({})", handle, engine);
        Ok(handle)
    }

    /// Opens `source` with the configured buffer size.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Open` - Unrecognised or malformed container
    /// - `BridgeError::Io` - The byte source failed
    pub async fn open_default(&self, source: Box<dyn ByteSource>) -> BridgeResult<SessionHandle> {
        self.open(source, self.config.io.buffer_size).await
    }

    /// Releases a session. Unknown and already closed handles are ignored.
    ///
    /// An operation already running on the session finishes first; the
    /// session is dropped when it releases the session.
    pub fn close(&self, handle: SessionHandle) {
        match self.sessions.remove(handle) {
            Some(_) => debug!("Closed session {}", handle),
            None => debug!("Ignoring close of unknown session {}", handle),
        }
    }

    fn session(
        &self,
        handle: SessionHandle,
    ) -> BridgeResult<Arc<tokio::sync::Mutex<Session>>> {
        self.sessions
            .get(handle)
            .ok_or(BridgeError::InvalidHandle { handle })
    }

    /// Describes the container and its streams.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidHandle` - Handle is unknown or closed
    pub async fn describe(&self, handle: SessionHandle) -> BridgeResult<MediaInfo> {
        let session = self.session(handle)?;
        let session = session.lock().await;
        Ok(describe(session.demuxer.format()))
    }

    /// Seeks to `timestamp` seconds and returns one packet of the selected
    /// stream.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidHandle` - Handle is unknown or closed
    /// - `BridgeError::StreamNotFound` - No stream of `media_type`
    /// - `BridgeError::Seek` - The engine rejected the seek
    /// - `BridgeError::PacketRead` - No matching packet before the data ended
    /// - `BridgeError::Io` - The byte source failed
    pub async fn fetch_packet(
        &self,
        handle: SessionHandle,
        media_type: MediaType,
        stream: Option<usize>,
        timestamp: f64,
        seek_flags: SeekFlags,
    ) -> BridgeResult<Packet> {
        let session = self.session(handle)?;
        let mut session = session.lock().await;
        fetch::fetch_packet(&mut session, media_type, stream, timestamp, seek_flags).await
    }

    /// Streams packets of the selected stream into `sink`, finishing with
    /// exactly one end marker.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidHandle` - Handle is unknown or closed
    /// - `BridgeError::StreamNotFound` - No stream of the requested type
    /// - `BridgeError::Seek` - The initial seek was rejected
    pub async fn stream_packets(
        &self,
        handle: SessionHandle,
        request: StreamRequest,
        sink: &mut dyn PacketSink,
    ) -> BridgeResult<StreamSummary> {
        let session = self.session(handle)?;
        let mut session = session.lock().await;
        stream::stream_packets(&mut session, request, sink).await
    }

    /// Traffic counters of a session's adapter.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidHandle` - Handle is unknown or closed
    pub async fn adapter_stats(
        &self,
        handle: SessionHandle,
    ) -> BridgeResult<crate::io::AdapterStats> {
        let session = self.session(handle)?;
        let session = session.lock().await;
        Ok(session.adapter().stats())
    }
}

impl Default for DemuxBridge {
    fn default() -> Self {
        Self::new(SeekableConfig::default())
    }
}
