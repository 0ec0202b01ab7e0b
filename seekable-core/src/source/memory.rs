//! In-memory byte source.

use async_trait::async_trait;
use bytes::Bytes;

use super::resolve_seek;
use crate::io::{ByteSource, SourceError, Whence};

/// Serves bytes from a shared in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    position: u64,
}

impl MemorySource {
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError> {
        let len = self.data.len() as u64;
        if self.position >= len {
            return Ok(Bytes::new());
        }
        let start = self.position as usize;
        let end = (start + max_bytes).min(self.data.len());
        self.position = end as u64;
        Ok(self.data.slice(start..end))
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SourceError> {
        self.position = resolve_seek(
            self.position,
            Some(self.data.len() as u64),
            offset,
            whence,
        )?;
        Ok(self.position)
    }

    async fn size(&mut self) -> Result<Option<u64>, SourceError> {
        Ok(Some(self.data.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_reads_sequentially() {
        let mut source = MemorySource::new(Bytes::from_static(b"abcdefgh"));

        assert_eq!(source.read(3).await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(source.read(10).await.unwrap(), Bytes::from_static(b"defgh"));
        assert!(source.read(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_source_seek_and_size() {
        let mut source = MemorySource::new(Bytes::from_static(b"abcdefgh"));

        assert_eq!(source.seek(-2, Whence::End).await.unwrap(), 6);
        assert_eq!(source.read(10).await.unwrap(), Bytes::from_static(b"gh"));
        assert_eq!(source.size().await.unwrap(), Some(8));
        assert!(source.seek(9, Whence::Set).await.is_err());
        assert_eq!(source.position(), 8);
    }
}
