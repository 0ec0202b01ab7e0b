//! Adapter that turns the engine's pull-style reads into awaits on a provider.
//!
//! The adapter owns the working buffer. Provider chunks are copied into it
//! and dropped immediately, so the provider never holds on to engine memory
//! and the engine never holds on to provider memory.

use tracing::trace;

use super::{ByteSource, IoError, IoResult, ReadStatus, SourceError, Whence};

/// Counters describing the traffic an adapter generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// Provider `read` calls.
    pub reads: u64,
    /// Bytes copied into the working buffer.
    pub bytes_read: u64,
    /// Provider `seek` calls.
    pub seeks: u64,
    /// Provider `size` calls.
    pub size_queries: u64,
}

/// Buffered bridge between a [`ByteSource`] and a container engine.
pub struct ByteSourceAdapter {
    source: Box<dyn ByteSource>,
    buffer: Vec<u8>,
    /// Source offset of `buffer[0]`.
    buffer_start: u64,
    filled: usize,
    cursor: usize,
    stats: AdapterStats,
}

impl ByteSourceAdapter {
    /// Wraps `source` with a working buffer of `buffer_size` bytes.
    pub fn new(source: Box<dyn ByteSource>, buffer_size: usize) -> Self {
        Self {
            source,
            buffer: vec![0; buffer_size.max(1)],
            buffer_start: 0,
            filled: 0,
            cursor: 0,
            stats: AdapterStats::default(),
        }
    }

    /// Logical read position as seen by the engine.
    pub fn position(&self) -> u64 {
        self.buffer_start + self.cursor as u64
    }

    /// Size of the working buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    fn buffered(&self) -> usize {
        self.filled - self.cursor
    }

    fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.buffer.copy_within(self.cursor..self.filled, 0);
        self.buffer_start += self.cursor as u64;
        self.filled -= self.cursor;
        self.cursor = 0;
    }

    fn discard_buffer(&mut self, new_position: u64) {
        self.buffer_start = new_position;
        self.filled = 0;
        self.cursor = 0;
    }

    /// Issues one provider read for the free part of the working buffer.
    ///
    /// A zero-length answer is reported as [`ReadStatus::EndOfStream`]; a
    /// positive answer is copied byte for byte behind the unread data.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider failed
    /// - `IoError::Overread` - The provider returned more than requested
    pub async fn fill(&mut self) -> IoResult<ReadStatus> {
        self.compact();
        let room = self.buffer.len() - self.filled;
        if room == 0 {
            return Ok(ReadStatus::Filled(0));
        }

        self.stats.reads += 1;
        let chunk = self.source.read(room).await?;
        trace!(
            requested = room,
            returned = chunk.len(),
            position = self.buffer_start + self.filled as u64,
            "byte source read"
        );

        if chunk.is_empty() {
            return Ok(ReadStatus::EndOfStream);
        }
        if chunk.len() > room {
            return Err(IoError::Overread {
                requested: room,
                returned: chunk.len(),
            });
        }

        self.buffer[self.filled..self.filled + chunk.len()].copy_from_slice(&chunk);
        self.filled += chunk.len();
        self.stats.bytes_read += chunk.len() as u64;
        Ok(ReadStatus::Filled(chunk.len()))
    }

    /// Moves the read position, or reports the total size for `Whence::Size`.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider rejected the seek
    /// - `IoError::SizeUnknown` - `Whence::Size` on an unbounded source
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> IoResult<u64> {
        match whence {
            Whence::Size => self.size().await?.ok_or(IoError::SizeUnknown),
            Whence::Set => {
                let target = u64::try_from(offset).map_err(|_| SourceError::SeekOutOfBounds {
                    position: offset,
                    size: None,
                })?;
                self.seek_to(target).await
            }
            Whence::Current => {
                let target = self.position() as i64 + offset;
                let target = u64::try_from(target).map_err(|_| SourceError::SeekOutOfBounds {
                    position: target,
                    size: None,
                })?;
                self.seek_to(target).await
            }
            Whence::End => {
                self.stats.seeks += 1;
                let position = self.source.seek(offset, Whence::End).await?;
                trace!(offset, position, "byte source seek from end");
                self.discard_buffer(position);
                Ok(position)
            }
        }
    }

    /// Seeks to an absolute offset. Targets inside the buffered window are
    /// served without a provider call.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider rejected the seek
    pub async fn seek_to(&mut self, target: u64) -> IoResult<u64> {
        let window_end = self.buffer_start + self.filled as u64;
        if target >= self.buffer_start && target <= window_end {
            self.cursor = (target - self.buffer_start) as usize;
            return Ok(target);
        }

        self.stats.seeks += 1;
        let position = self.source.seek(target as i64, Whence::Set).await?;
        trace!(target, position, "byte source seek");
        self.discard_buffer(position);
        Ok(position)
    }

    /// Asks the provider for the total size.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider failed to report its size
    pub async fn size(&mut self) -> IoResult<Option<u64>> {
        self.stats.size_queries += 1;
        let size = self.source.size().await?;
        trace!(?size, "byte source size");
        Ok(size)
    }

    /// Fills `out` completely.
    ///
    /// # Errors
    ///
    /// - `IoError::UnexpectedEof` - Data ended first
    /// - `IoError::Source` - The provider failed
    pub async fn read_exact(&mut self, out: &mut [u8]) -> IoResult<()> {
        let mut written = 0;
        while written < out.len() {
            if self.buffered() == 0 {
                if self.fill().await? == ReadStatus::EndOfStream {
                    return Err(IoError::UnexpectedEof {
                        needed: out.len(),
                        available: written,
                    });
                }
                continue;
            }
            let n = (out.len() - written).min(self.buffered());
            out[written..written + n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
            self.cursor += n;
            written += n;
        }
        Ok(())
    }

    /// Appends up to `max` bytes to `out`, stopping early only at end of data.
    /// Returns the number of bytes appended; zero means end of data.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider failed
    pub async fn read_up_to(&mut self, out: &mut Vec<u8>, max: usize) -> IoResult<usize> {
        let mut appended = 0;
        while appended < max {
            if self.buffered() == 0 && self.fill().await? == ReadStatus::EndOfStream {
                break;
            }
            let n = (max - appended).min(self.buffered());
            out.extend_from_slice(&self.buffer[self.cursor..self.cursor + n]);
            self.cursor += n;
            appended += n;
        }
        Ok(appended)
    }

    /// Skips `count` bytes forward.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider rejected the seek
    pub async fn skip(&mut self, count: u64) -> IoResult<u64> {
        if count <= self.buffered() as u64 {
            self.cursor += count as usize;
            return Ok(self.position());
        }
        self.seek_to(self.position() + count).await
    }

    /// Returns up to `len` upcoming bytes without consuming them.
    ///
    /// `len` is capped at the buffer size. Fewer bytes come back only when
    /// the source ends first.
    ///
    /// # Errors
    ///
    /// - `IoError::Source` - The provider failed
    pub async fn peek(&mut self, len: usize) -> IoResult<&[u8]> {
        let len = len.min(self.buffer.len());
        while self.buffered() < len {
            match self.fill().await? {
                ReadStatus::EndOfStream | ReadStatus::Filled(0) => break,
                ReadStatus::Filled(_) => {}
            }
        }
        let end = self.cursor + len.min(self.buffered());
        Ok(&self.buffer[self.cursor..end])
    }

    pub async fn read_u8(&mut self) -> IoResult<u8> {
        let mut raw = [0u8; 1];
        self.read_exact(&mut raw).await?;
        Ok(raw[0])
    }

    pub async fn read_u16_le(&mut self) -> IoResult<u16> {
        let mut raw = [0u8; 2];
        self.read_exact(&mut raw).await?;
        Ok(u16::from_le_bytes(raw))
    }

    pub async fn read_u32_le(&mut self) -> IoResult<u32> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw).await?;
        Ok(u32::from_le_bytes(raw))
    }

    pub async fn read_i32_le(&mut self) -> IoResult<i32> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw).await?;
        Ok(i32::from_le_bytes(raw))
    }

    pub async fn read_i64_le(&mut self) -> IoResult<i64> {
        let mut raw = [0u8; 8];
        self.read_exact(&mut raw).await?;
        Ok(i64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::source::MemorySource;

    fn sample_adapter(len: usize, buffer_size: usize) -> ByteSourceAdapter {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        ByteSourceAdapter::new(Box::new(MemorySource::new(Bytes::from(data))), buffer_size)
    }

    struct GreedySource;

    #[async_trait]
    impl ByteSource for GreedySource {
        async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError> {
            Ok(Bytes::from(vec![0u8; max_bytes + 1]))
        }

        async fn seek(&mut self, offset: i64, _whence: Whence) -> Result<u64, SourceError> {
            Ok(offset as u64)
        }

        async fn size(&mut self) -> Result<Option<u64>, SourceError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_fill_copies_exactly_what_provider_returned() {
        let mut adapter = sample_adapter(10, 4);

        assert_eq!(adapter.fill().await.unwrap(), ReadStatus::Filled(4));
        assert_eq!(adapter.stats().bytes_read, 4);
        assert_eq!(adapter.position(), 0);
    }

    #[tokio::test]
    async fn test_fill_reports_end_of_stream_on_empty_read() {
        let mut adapter = sample_adapter(0, 8);
        assert_eq!(adapter.fill().await.unwrap(), ReadStatus::EndOfStream);
    }

    #[tokio::test]
    async fn test_read_exact_spans_multiple_fills() {
        let mut adapter = sample_adapter(20, 3);
        let mut out = [0u8; 10];
        adapter.read_exact(&mut out).await.unwrap();

        assert_eq!(out, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(adapter.position(), 10);
        assert!(adapter.stats().reads >= 4);
    }

    #[tokio::test]
    async fn test_read_exact_fails_at_end_of_data() {
        let mut adapter = sample_adapter(5, 8);
        let mut out = [0u8; 8];
        let err = adapter.read_exact(&mut out).await.unwrap_err();
        assert!(matches!(
            err,
            IoError::UnexpectedEof {
                needed: 8,
                available: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_seek_size_routes_to_provider_size() {
        let mut adapter = sample_adapter(123, 16);
        let size = adapter.seek(0, Whence::Size).await.unwrap();

        assert_eq!(size, 123);
        assert_eq!(adapter.stats().size_queries, 1);
        assert_eq!(adapter.stats().seeks, 0);
    }

    #[tokio::test]
    async fn test_seek_inside_buffer_avoids_provider() {
        let mut adapter = sample_adapter(64, 32);
        adapter.peek(32).await.unwrap();

        assert_eq!(adapter.seek(10, Whence::Set).await.unwrap(), 10);
        assert_eq!(adapter.read_u8().await.unwrap(), 10);
        assert_eq!(adapter.stats().seeks, 0);

        assert_eq!(adapter.seek(50, Whence::Set).await.unwrap(), 50);
        assert_eq!(adapter.read_u8().await.unwrap(), 50);
        assert_eq!(adapter.stats().seeks, 1);
    }

    #[tokio::test]
    async fn test_seek_current_is_relative_to_logical_position() {
        let mut adapter = sample_adapter(100, 8);
        let mut out = [0u8; 5];
        adapter.read_exact(&mut out).await.unwrap();

        assert_eq!(adapter.seek(20, Whence::Current).await.unwrap(), 25);
        assert_eq!(adapter.read_u8().await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_negative_absolute_seek_is_rejected() {
        let mut adapter = sample_adapter(10, 8);
        let err = adapter.seek(-1, Whence::Set).await.unwrap_err();
        assert!(matches!(
            err,
            IoError::Source(SourceError::SeekOutOfBounds { position: -1, .. })
        ));
    }

    #[tokio::test]
    async fn test_overread_is_an_io_failure() {
        let mut adapter = ByteSourceAdapter::new(Box::new(GreedySource), 8);
        let err = adapter.fill().await.unwrap_err();
        assert!(matches!(
            err,
            IoError::Overread {
                requested: 8,
                returned: 9
            }
        ));
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let mut adapter = sample_adapter(50, 16);
        assert_eq!(adapter.peek(4).await.unwrap(), &[0, 1, 2, 3]);
        assert_eq!(adapter.peek(100).await.unwrap().len(), 16);
        assert_eq!(adapter.read_u8().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_up_to_stops_at_end_of_data() {
        let mut adapter = sample_adapter(6, 4);
        let mut out = Vec::new();
        assert_eq!(adapter.read_up_to(&mut out, 10).await.unwrap(), 6);
        assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(adapter.read_up_to(&mut out, 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_little_endian_helpers() {
        let data = Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xff]);
        let mut adapter = ByteSourceAdapter::new(Box::new(MemorySource::new(data)), 3);

        assert_eq!(adapter.read_u16_le().await.unwrap(), 0x0201);
        assert_eq!(adapter.read_u16_le().await.unwrap(), 0x0403);
        assert_eq!(adapter.read_i32_le().await.unwrap(), -1);
    }

    proptest::proptest! {
        #[test]
        fn prop_reads_match_source_bytes(
            buffer_size in 1usize..64,
            steps in proptest::collection::vec((0u64..300, 0usize..80), 1..12),
        ) {
            let data: Vec<u8> = (0..256).map(|i| (i % 251) as u8).collect();
            let mut adapter = sample_adapter(256, buffer_size);

            for (target, len) in steps {
                let (position, out) = tokio_test::block_on(async {
                    let position = adapter.seek(target as i64, Whence::Set).await;
                    let mut out = Vec::new();
                    if position.is_ok() {
                        adapter.read_up_to(&mut out, len).await.unwrap();
                    }
                    (position, out)
                });

                match position {
                    Ok(position) => {
                        let start = position as usize;
                        let end = (start + len).min(data.len());
                        proptest::prop_assert_eq!(&out[..], &data[start..end]);
                    }
                    Err(_) => proptest::prop_assert!(target > 256),
                }
            }
        }
    }
}
