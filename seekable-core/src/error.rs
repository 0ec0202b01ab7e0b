//! Errors surfaced at the bridge boundary.

use crate::engine::{EngineError, MediaType};
use crate::io::{IoError, SourceError};
use crate::session::SessionHandle;

/// Failures reported by [`crate::DemuxBridge`] operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The source could not be opened: no engine recognised it, or its
    /// header or stream analysis failed.
    #[error("Failed to open source: {reason}")]
    Open { reason: String },

    #[error("Invalid session handle: {handle}")]
    InvalidHandle { handle: SessionHandle },

    #[error("No {media_type} stream found")]
    StreamNotFound { media_type: MediaType },

    #[error("Seek failed: {reason}")]
    Seek { reason: String },

    #[error("Packet read failed: {reason}")]
    PacketRead { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// A [`crate::SeekableMedia`] call was made before anything was loaded.
    #[error("No media loaded")]
    NotLoaded,
}

impl BridgeError {
    /// Stable machine-readable identifier for hosts.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Open { .. } => "SOURCE_OPEN_FAILED",
            BridgeError::InvalidHandle { .. } => "INVALID_HANDLE",
            BridgeError::StreamNotFound { .. } => "STREAM_NOT_FOUND",
            BridgeError::Seek { .. } => "SEEK_FAILED",
            BridgeError::PacketRead { .. } => "PACKET_READ_FAILED",
            BridgeError::Io(_) => "IO_ERROR",
            BridgeError::NotLoaded => "NOT_LOADED",
        }
    }

    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::Open { .. } => "The media source could not be opened".to_string(),
            BridgeError::InvalidHandle { .. } => "The media session is no longer open".to_string(),
            BridgeError::StreamNotFound { media_type } => {
                format!("The media has no {media_type} stream")
            }
            BridgeError::Seek { .. } => "Could not seek to the requested position".to_string(),
            BridgeError::PacketRead { .. } => "No packet available at that position".to_string(),
            BridgeError::Io(e) => format!("Reading the media source failed: {e}"),
            BridgeError::NotLoaded => "Load a media source first".to_string(),
        }
    }

    /// Maps an engine failure during open. Provider failures keep their
    /// I/O identity; everything else is an open failure.
    pub(crate) fn from_open(error: EngineError) -> Self {
        match error {
            // A header cut short is a bad container, not a provider failure
            EngineError::Io(IoError::UnexpectedEof { needed, available }) => BridgeError::Open {
                reason: format!("header truncated: needed {needed} bytes, got {available}"),
            },
            EngineError::Io(e) => BridgeError::Io(e),
            other => BridgeError::Open {
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn from_seek(error: EngineError) -> Self {
        BridgeError::Seek {
            reason: error.to_string(),
        }
    }

    /// Maps an engine failure while reading packets for a single fetch.
    pub(crate) fn from_read(error: EngineError) -> Self {
        match error {
            EngineError::Io(e) => BridgeError::Io(e),
            other => BridgeError::PacketRead {
                reason: other.to_string(),
            },
        }
    }
}

impl From<SourceError> for BridgeError {
    fn from(error: SourceError) -> Self {
        BridgeError::Io(IoError::Source(error))
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let cases = [
            (
                BridgeError::Open {
                    reason: "x".to_string(),
                },
                "SOURCE_OPEN_FAILED",
            ),
            (
                BridgeError::InvalidHandle {
                    handle: SessionHandle::from_raw(7),
                },
                "INVALID_HANDLE",
            ),
            (
                BridgeError::StreamNotFound {
                    media_type: MediaType::Video,
                },
                "STREAM_NOT_FOUND",
            ),
            (
                BridgeError::Seek {
                    reason: "x".to_string(),
                },
                "SEEK_FAILED",
            ),
            (
                BridgeError::PacketRead {
                    reason: "x".to_string(),
                },
                "PACKET_READ_FAILED",
            ),
            (BridgeError::Io(IoError::SizeUnknown), "IO_ERROR"),
            (BridgeError::NotLoaded, "NOT_LOADED"),
        ];

        for (error, code) in cases {
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_engine_errors_keep_io_identity() {
        let io = EngineError::Io(IoError::Source(SourceError::SizeUnknown));
        assert!(matches!(BridgeError::from_open(io), BridgeError::Io(_)));

        let truncated = EngineError::Io(IoError::UnexpectedEof {
            needed: 16,
            available: 4,
        });
        assert!(matches!(
            BridgeError::from_open(truncated),
            BridgeError::Open { reason } if reason.contains("truncated")
        ));

        let invalid = EngineError::InvalidData {
            reason: "bad header".to_string(),
        };
        assert!(matches!(
            BridgeError::from_open(invalid),
            BridgeError::Open { reason } if reason.contains("bad header")
        ));

        let unsupported = EngineError::Unsupported {
            reason: "codec".to_string(),
        };
        assert!(matches!(
            BridgeError::from_read(unsupported),
            BridgeError::PacketRead { .. }
        ));
    }

    #[test]
    fn test_user_message_names_media_type() {
        let error = BridgeError::StreamNotFound {
            media_type: MediaType::Subtitle,
        };
        assert_eq!(error.user_message(), "The media has no subtitle stream");
    }
}
