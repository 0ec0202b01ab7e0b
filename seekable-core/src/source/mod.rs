//! Byte sources shipped with the bridge.
//!
//! Hosts can supply their own [`ByteSource`](crate::io::ByteSource); these
//! cover the common cases: HTTP servers with range support, local files and
//! in-memory buffers.

pub mod file;
pub mod http;
pub mod memory;

pub use file::FileSource;
pub use http::HttpRangeSource;
pub use memory::MemorySource;

use crate::io::{SourceError, Whence};

/// Resolves a seek request against a current position and an optional size.
///
/// Shared by sources that track their own position.
///
/// # Errors
///
/// - `SourceError::SizeUnknown` - `Whence::End` without a known size
/// - `SourceError::SeekOutOfBounds` - Target before 0 or past the end
pub(crate) fn resolve_seek(
    position: u64,
    size: Option<u64>,
    offset: i64,
    whence: Whence,
) -> Result<u64, SourceError> {
    let target = match whence {
        Whence::Set => offset,
        Whence::Current => position as i64 + offset,
        Whence::End => size.ok_or(SourceError::SizeUnknown)? as i64 + offset,
        Whence::Size => return size.ok_or(SourceError::SizeUnknown),
    };

    let out_of_bounds = target < 0 || size.is_some_and(|size| target as u64 > size);
    if out_of_bounds {
        return Err(SourceError::SeekOutOfBounds {
            position: target,
            size,
        });
    }
    Ok(target as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_seek_variants() {
        assert_eq!(resolve_seek(10, Some(100), 5, Whence::Set).unwrap(), 5);
        assert_eq!(resolve_seek(10, Some(100), 5, Whence::Current).unwrap(), 15);
        assert_eq!(resolve_seek(10, Some(100), -20, Whence::End).unwrap(), 80);
        assert_eq!(resolve_seek(10, Some(100), 0, Whence::Size).unwrap(), 100);
    }

    #[test]
    fn test_resolve_seek_bounds() {
        assert!(matches!(
            resolve_seek(0, Some(100), 101, Whence::Set),
            Err(SourceError::SeekOutOfBounds { position: 101, .. })
        ));
        assert!(matches!(
            resolve_seek(5, Some(100), -6, Whence::Current),
            Err(SourceError::SeekOutOfBounds { position: -1, .. })
        ));
        // Seeking to exactly the end is allowed
        assert_eq!(resolve_seek(0, Some(100), 100, Whence::Set).unwrap(), 100);
    }

    #[test]
    fn test_resolve_seek_unbounded_source() {
        assert_eq!(resolve_seek(0, None, 1 << 40, Whence::Set).unwrap(), 1 << 40);
        assert!(matches!(
            resolve_seek(0, None, 0, Whence::End),
            Err(SourceError::SizeUnknown)
        ));
    }
}
