//! Mock byte source for deterministic testing.
//!
//! Serves bytes from an in-memory buffer with configurable failure modes,
//! short reads and delays, so adapter and bridge behaviour can be exercised
//! without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use seekable_core::io::{ByteSource, SourceError, Whence};

/// Shared counters and switches. Clones of a [`MockByteSource`] share them,
/// so a test can keep a clone to inspect a source it handed to the bridge.
#[derive(Default)]
struct Controls {
    fail_on_read: AtomicBool,
    fail_on_seek: AtomicBool,
    read_count: AtomicU64,
    seek_count: AtomicU64,
    size_count: AtomicU64,
    bytes_served: AtomicU64,
}

/// In-memory [`ByteSource`] with failure injection.
#[derive(Clone)]
pub struct MockByteSource {
    data: Bytes,
    position: u64,
    /// Upper bound on bytes returned per read.
    max_chunk: usize,
    read_delay: Duration,
    /// Report the size as unknown.
    hide_size: bool,
    controls: Arc<Controls>,
}

impl MockByteSource {
    /// Creates a mock serving `data` with no delays or failures.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            position: 0,
            max_chunk: usize::MAX,
            read_delay: Duration::ZERO,
            hide_size: false,
            controls: Arc::new(Controls::default()),
        }
    }

    /// Caps every read at `max_chunk` bytes, simulating short reads.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// Sleeps for `delay` before every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Reports the size as unknown, like a live stream.
    pub fn with_unknown_size(mut self) -> Self {
        self.hide_size = true;
        self
    }

    /// Fails the next read. The failure is cleared after one attempt.
    pub fn fail_next_read(&self) {
        self.controls.fail_on_read.store(true, Ordering::Release);
    }

    /// Fails the next seek. The failure is cleared after one attempt.
    pub fn fail_next_seek(&self) {
        self.controls.fail_on_seek.store(true, Ordering::Release);
    }

    pub fn read_count(&self) -> u64 {
        self.controls.read_count.load(Ordering::Acquire)
    }

    pub fn seek_count(&self) -> u64 {
        self.controls.seek_count.load(Ordering::Acquire)
    }

    pub fn size_count(&self) -> u64 {
        self.controls.size_count.load(Ordering::Acquire)
    }

    pub fn bytes_served(&self) -> u64 {
        self.controls.bytes_served.load(Ordering::Acquire)
    }

    /// Resets all failure modes and counters.
    pub fn reset(&self) {
        let controls = &self.controls;
        controls.fail_on_read.store(false, Ordering::Release);
        controls.fail_on_seek.store(false, Ordering::Release);
        controls.read_count.store(0, Ordering::Release);
        controls.seek_count.store(0, Ordering::Release);
        controls.size_count.store(0, Ordering::Release);
        controls.bytes_served.store(0, Ordering::Release);
    }

    /// Boxes a clone for handing to the bridge.
    pub fn boxed(&self) -> Box<dyn ByteSource> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl ByteSource for MockByteSource {
    async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError> {
        self.controls.read_count.fetch_add(1, Ordering::AcqRel);

        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }

        if self.controls.fail_on_read.swap(false, Ordering::AcqRel) {
            return Err(SourceError::Network {
                reason: "simulated read failure".to_string(),
            });
        }

        let start = (self.position as usize).min(self.data.len());
        let end = start + max_bytes.min(self.max_chunk).min(self.data.len() - start);
        let chunk = self.data.slice(start..end);

        self.position = end as u64;
        self.controls
            .bytes_served
            .fetch_add(chunk.len() as u64, Ordering::AcqRel);
        Ok(chunk)
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SourceError> {
        self.controls.seek_count.fetch_add(1, Ordering::AcqRel);

        if self.controls.fail_on_seek.swap(false, Ordering::AcqRel) {
            return Err(SourceError::Network {
                reason: "simulated seek failure".to_string(),
            });
        }

        let size = self.data.len() as i64;
        let target = match whence {
            Whence::Set => offset,
            Whence::Current => self.position as i64 + offset,
            Whence::End if self.hide_size => return Err(SourceError::SizeUnknown),
            Whence::End => size + offset,
            Whence::Size => return Ok(size as u64),
        };
        if target < 0 || target > size {
            return Err(SourceError::SeekOutOfBounds {
                position: target,
                size: (!self.hide_size).then_some(size as u64),
            });
        }

        self.position = target as u64;
        Ok(self.position)
    }

    async fn size(&mut self) -> Result<Option<u64>, SourceError> {
        self.controls.size_count.fetch_add(1, Ordering::AcqRel);
        if self.hide_size {
            Ok(None)
        } else {
            Ok(Some(self.data.len() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MockByteSource {
        MockByteSource::new(Bytes::from((0u8..100).collect::<Vec<_>>()))
    }

    #[tokio::test]
    async fn test_reads_respect_max_chunk() {
        let mut source = sample().with_max_chunk(7);

        assert_eq!(source.read(50).await.unwrap().len(), 7);
        assert_eq!(source.read(3).await.unwrap().as_ref(), &[7, 8, 9]);
        assert_eq!(source.read_count(), 2);
        assert_eq!(source.bytes_served(), 10);
    }

    #[tokio::test]
    async fn test_read_at_end_is_empty() {
        let mut source = sample();
        source.seek(0, Whence::End).await.unwrap();
        assert!(source.read(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_read_is_one_shot() {
        let mut source = sample();
        let observer = source.clone();
        observer.fail_next_read();

        assert!(source.read(10).await.is_err());
        assert_eq!(source.read(10).await.unwrap().len(), 10);
        assert_eq!(observer.read_count(), 2);
    }

    #[tokio::test]
    async fn test_seek_bounds_and_failure() {
        let mut source = sample();

        assert_eq!(source.seek(-10, Whence::End).await.unwrap(), 90);
        assert_eq!(source.seek(5, Whence::Current).await.unwrap(), 95);
        assert!(matches!(
            source.seek(101, Whence::Set).await,
            Err(SourceError::SeekOutOfBounds { position: 101, .. })
        ));

        source.fail_next_seek();
        assert!(source.seek(0, Whence::Set).await.is_err());
        assert_eq!(source.seek(0, Whence::Set).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_size() {
        let mut source = sample().with_unknown_size();
        assert_eq!(source.size().await.unwrap(), None);
        assert!(matches!(
            source.seek(0, Whence::End).await,
            Err(SourceError::SizeUnknown)
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_counters() {
        let mut source = sample();
        source.read(1).await.unwrap();
        source.size().await.unwrap();
        source.fail_next_read();

        source.reset();
        assert_eq!(source.read_count(), 0);
        assert_eq!(source.size_count(), 0);
        assert!(source.read(1).await.is_ok());
    }
}
