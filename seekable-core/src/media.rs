//! One-source convenience wrapper over [`DemuxBridge`].
//!
//! `SeekableMedia` keeps at most one session open. Loading a new source
//! closes the previous one, and dropping the wrapper closes whatever is
//! still open.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::bridge::DemuxBridge;
use crate::config::SeekableConfig;
use crate::engine::MediaType;
use crate::error::{BridgeError, BridgeResult};
use crate::io::{ByteSource, SourceError};
use crate::normalize::{GENERIC_MIME_TYPE, MediaInfo, Packet};
use crate::session::SessionHandle;
use crate::source::{FileSource, HttpRangeSource};
use crate::stream::{PacketStream, ResultSink, StreamRequest};

/// Audio packets of a range together with the content type to serve them as.
pub struct AudioStream {
    pub packets: PacketStream,
    pub mime_type: String,
}

/// A single loaded media source.
pub struct SeekableMedia {
    bridge: Arc<DemuxBridge>,
    handle: Option<SessionHandle>,
}

impl SeekableMedia {
    pub fn new(config: SeekableConfig) -> Self {
        Self::with_bridge(Arc::new(DemuxBridge::new(config)))
    }

    /// Shares `bridge` with other users; only this wrapper's session is
    /// managed here.
    pub fn with_bridge(bridge: Arc<DemuxBridge>) -> Self {
        Self {
            bridge,
            handle: None,
        }
    }

    pub fn bridge(&self) -> &Arc<DemuxBridge> {
        &self.bridge
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// Opens `source`, closing any previously loaded one first.
    /// `buffer_size` defaults to the configured working buffer size.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Open` - Unrecognised or malformed container
    /// - `BridgeError::Io` - The byte source failed
    pub async fn load(
        &mut self,
        source: Box<dyn ByteSource>,
        buffer_size: Option<usize>,
    ) -> BridgeResult<()> {
        self.destroy();
        let buffer_size = buffer_size.unwrap_or(self.bridge.config().io.buffer_size);
        self.handle = Some(self.bridge.open(source, buffer_size).await?);
        Ok(())
    }

    /// Loads a remote file through HTTP range requests.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Io` - The URL is invalid or the server is unusable
    /// - `BridgeError::Open` - Unrecognised or malformed container
    pub async fn load_url(&mut self, url: &str, buffer_size: Option<usize>) -> BridgeResult<()> {
        let url = Url::parse(url).map_err(|e| SourceError::Network {
            reason: format!("invalid URL {url}: {e}"),
        })?;
        let source = HttpRangeSource::new(url, &self.bridge.config().http)?;
        self.load(Box::new(source), buffer_size).await
    }

    /// Loads a local file.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Io` - The file cannot be opened
    /// - `BridgeError::Open` - Unrecognised or malformed container
    pub async fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        buffer_size: Option<usize>,
    ) -> BridgeResult<()> {
        let source = FileSource::open(path).await?;
        self.load(Box::new(source), buffer_size).await
    }

    fn loaded(&self) -> BridgeResult<SessionHandle> {
        self.handle.ok_or(BridgeError::NotLoaded)
    }

    /// # Errors
    ///
    /// - `BridgeError::NotLoaded` - Nothing is loaded
    pub async fn media_info(&self) -> BridgeResult<MediaInfo> {
        self.bridge.describe(self.loaded()?).await
    }

    /// Audio packet at `seconds`, landing on the nearest earlier sync point.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotLoaded` - Nothing is loaded
    /// - `BridgeError::StreamNotFound` - The media has no audio
    /// - `BridgeError::PacketRead` - No packet at that position
    pub async fn packet_at(&self, seconds: f64) -> BridgeResult<Packet> {
        let flags = self.bridge.config().streaming.seek_flags;
        self.bridge
            .fetch_packet(self.loaded()?, MediaType::Audio, None, seconds, flags)
            .await
    }

    /// Streams audio packets between `start` and `end` seconds (`end <= 0`
    /// means to the end) from a background task.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// The background task holds the session until the range is finished,
    /// so [`media_info`](Self::media_info) and [`packet_at`](Self::packet_at)
    /// on this media wait until the returned stream is drained or dropped.
    /// Awaiting either of them while holding an undrained stream on the same
    /// task never completes once the channel fills up.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotLoaded` - Nothing is loaded
    pub async fn audio_stream(&self, start: f64, end: f64) -> BridgeResult<AudioStream> {
        let handle = self.loaded()?;
        let info = self.bridge.describe(handle).await?;
        let mime_type = info
            .first_stream_of(MediaType::Audio)
            .map_or(GENERIC_MIME_TYPE.to_string(), |stream| stream.mime_type.clone());

        let (sender, receiver) = mpsc::channel(self.bridge.config().streaming.channel_capacity.max(1));
        let request = StreamRequest::new(MediaType::Audio)
            .range(start, end)
            .seek_flags(self.bridge.config().streaming.seek_flags);
        let bridge = Arc::clone(&self.bridge);

        tokio::spawn(async move {
            let mut sink = ResultSink::new(sender);
            match bridge.stream_packets(handle, request, &mut sink).await {
                Ok(summary) => debug!(
                    "Audio stream finished after {} packets ({:?})",
                    summary.packets_delivered, summary.stop_reason
                ),
                Err(e) => sink.fail(e).await,
            }
        });

        Ok(AudioStream {
            packets: PacketStream::new(receiver),
            mime_type,
        })
    }

    /// Closes the loaded source, if any.
    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.bridge.close(handle);
        }
    }
}

impl Default for SeekableMedia {
    fn default() -> Self {
        Self::new(SeekableConfig::default())
    }
}

impl Drop for SeekableMedia {
    fn drop(&mut self) {
        self.destroy();
    }
}
