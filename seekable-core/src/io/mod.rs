//! Byte-source contract consumed by the bridge.
//!
//! The host supplies bytes asynchronously (HTTP range fetches, chunked file
//! reads, in-memory buffers). Engines never see the provider directly; every
//! engine read goes through [`ByteSourceAdapter`], which is the only place the
//! bridge suspends on external I/O.

pub mod adapter;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use adapter::{AdapterStats, ByteSourceAdapter};

/// Origin for a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset from the start of the source.
    Set,
    /// Offset relative to the current position.
    Current,
    /// Offset relative to the end of the source.
    End,
    /// Report the total size instead of moving. The offset is ignored.
    Size,
}

impl Whence {
    /// Maps the classic numeric whence values (0, 1, 2) plus the size sentinel.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Whence::Set),
            1 => Some(Whence::Current),
            2 => Some(Whence::End),
            SEEK_SIZE_CODE => Some(Whence::Size),
            _ => None,
        }
    }
}

/// Numeric sentinel that asks for the total size in place of a seek.
pub const SEEK_SIZE_CODE: i32 = 0x10000;

/// Asynchronous byte provider supplied by the host environment.
///
/// Implementations own their position. A read returning an empty buffer
/// signals end of data.
#[async_trait]
pub trait ByteSource: Send {
    /// Reads at most `max_bytes` from the current position.
    ///
    /// # Errors
    ///
    /// - `SourceError::NotFound` - The resource disappeared
    /// - `SourceError::Network` - Transport failure
    /// - `SourceError::Io` - Local I/O failure
    async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError>;

    /// Moves the position and returns the new absolute offset.
    ///
    /// `Whence::Size` is never passed here; the adapter routes it to [`size`](Self::size).
    ///
    /// # Errors
    ///
    /// - `SourceError::SeekOutOfBounds` - Target lies before 0 or past the end
    /// - `SourceError::SizeUnknown` - `Whence::End` on an unbounded source
    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SourceError>;

    /// Total size in bytes, `None` when the source is unbounded or unknown.
    ///
    /// # Errors
    ///
    /// - `SourceError::Network` - Size query failed
    async fn size(&mut self) -> Result<Option<u64>, SourceError>;
}

/// Failures reported by a byte provider.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The resource could not be found.
    #[error("resource not found: {location}")]
    NotFound {
        /// URL or path that was requested.
        location: String,
    },

    /// The transport failed or answered with an unexpected status.
    #[error("network error: {reason}")]
    Network {
        /// Description of the failure.
        reason: String,
    },

    /// The server cannot serve byte ranges, so seeking is impossible.
    #[error("byte-range requests not supported by {location}")]
    RangeNotSupported {
        /// URL that rejected range requests.
        location: String,
    },

    /// A seek target fell outside the source.
    #[error("seek position {position} out of bounds (size {size:?})")]
    SeekOutOfBounds {
        /// Requested absolute position.
        position: i64,
        /// Known size of the source, if any.
        size: Option<u64>,
    },

    /// An operation needed the total size but the source is unbounded.
    #[error("source size is unknown")]
    SizeUnknown,

    /// Underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by the adapter to engines.
#[derive(Debug, Error)]
pub enum IoError {
    /// The provider failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The provider returned more bytes than the adapter asked for.
    #[error("byte source returned {returned} bytes for a {requested}-byte read")]
    Overread {
        /// Bytes requested from the provider.
        requested: usize,
        /// Bytes the provider actually returned.
        returned: usize,
    },

    /// Data ended before a fixed-size read completed.
    #[error("unexpected end of data: needed {needed} bytes, got {available}")]
    UnexpectedEof {
        /// Bytes the caller required.
        needed: usize,
        /// Bytes that were available.
        available: usize,
    },

    /// A size query was answered with "unknown".
    #[error("source size is unknown")]
    SizeUnknown,
}

/// Result type for adapter operations.
pub type IoResult<T> = Result<T, IoError>;

/// Outcome of a single provider read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were copied into the working buffer.
    Filled(usize),
    /// The provider has no more data.
    EndOfStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whence_from_code() {
        assert_eq!(Whence::from_code(0), Some(Whence::Set));
        assert_eq!(Whence::from_code(1), Some(Whence::Current));
        assert_eq!(Whence::from_code(2), Some(Whence::End));
        assert_eq!(Whence::from_code(SEEK_SIZE_CODE), Some(Whence::Size));
        assert_eq!(Whence::from_code(7), None);
    }

    #[test]
    fn test_source_error_converts_into_io_error() {
        let err: IoError = SourceError::SizeUnknown.into();
        assert!(matches!(err, IoError::Source(SourceError::SizeUnknown)));
        assert_eq!(err.to_string(), "source size is unknown");
    }
}
