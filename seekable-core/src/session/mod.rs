//! Per-source demuxing state and its lifetime.

pub mod registry;

use std::sync::Arc;

use tracing::debug;

pub use registry::{SessionHandle, SessionRegistry};

use crate::engine::{ContainerEngine, Demuxer, RawPacket, select_engine};
use crate::error::{BridgeError, BridgeResult};
use crate::io::{ByteSource, ByteSourceAdapter};

/// One opened source: the engine's parser state, the adapter feeding it and
/// the scratch packet reused across reads.
///
/// The three parts are disjoint fields so an engine call can borrow the
/// adapter and packet mutably at the same time.
pub struct Session {
    pub(crate) demuxer: Box<dyn Demuxer>,
    pub(crate) io: ByteSourceAdapter,
    pub(crate) packet: RawPacket,
    engine_name: &'static str,
}

impl Session {
    /// Probes `source`, opens it with the best matching engine and analyses
    /// its streams. Nothing is kept when any step fails.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Open` - No engine recognised the data, or the header or
    ///   stream analysis was rejected
    /// - `BridgeError::Io` - The byte source failed
    pub async fn open(
        engines: &[Arc<dyn ContainerEngine>],
        source: Box<dyn ByteSource>,
        buffer_size: usize,
        probe_size: usize,
    ) -> BridgeResult<Self> {
        let mut io = ByteSourceAdapter::new(source, buffer_size);

        let header = io.peek(probe_size).await?;
        let engine = select_engine(engines, header).ok_or_else(|| BridgeError::Open {
            reason: format!(
                "no engine recognised the data ({} header bytes probed)",
                header.len()
            ),
        })?;
        let engine_name = engine.name();

        let mut demuxer = engine.open(&mut io).await.map_err(BridgeError::from_open)?;
        demuxer
            .find_stream_info(&mut io)
            .await
            .map_err(BridgeError::from_open)?;

        debug!(
            "Opened {} source with {} streams",
            engine_name,
            demuxer.format().streams.len()
        );

        Ok(Self {
            demuxer,
            io,
            packet: RawPacket::new(),
            engine_name,
        })
    }

    /// Name of the engine that opened this session.
    pub fn engine_name(&self) -> &'static str {
        self.engine_name
    }

    pub fn adapter(&self) -> &ByteSourceAdapter {
        &self.io
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::engine::default_engines;
    use crate::source::MemorySource;

    fn memory(data: &'static [u8]) -> Box<dyn ByteSource> {
        Box::new(MemorySource::new(Bytes::from_static(data)))
    }

    #[tokio::test]
    async fn test_unrecognised_data_fails_to_open() {
        let result = Session::open(&default_engines(), memory(b"not a container"), 64, 32).await;
        assert!(matches!(result, Err(BridgeError::Open { .. })));
    }

    #[tokio::test]
    async fn test_empty_source_fails_to_open() {
        let result = Session::open(&default_engines(), memory(b""), 64, 32).await;
        assert!(matches!(result, Err(BridgeError::Open { .. })));
    }

    #[tokio::test]
    async fn test_truncated_header_fails_to_open() {
        // Recognised signature, but the fmt chunk body is cut short
        let data = b"RIFF\x24\0\0\0WAVEfmt \x10\0\0\0\x01\0\x02\0";
        let result = Session::open(&default_engines(), memory(data), 64, 32).await;
        assert!(matches!(result, Err(BridgeError::Open { .. })));
        assert_eq!(result.err().map(|e| e.code()), Some("SOURCE_OPEN_FAILED"));
    }
}
