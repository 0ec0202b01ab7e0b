//! Chunked reads from a local file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::resolve_seek;
use crate::io::{ByteSource, SourceError, Whence};

/// Byte source backed by a local file opened through `tokio::fs`.
pub struct FileSource {
    file: File,
    path: PathBuf,
    position: u64,
    size: u64,
}

impl FileSource {
    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// - `SourceError::NotFound` - The file does not exist
    /// - `SourceError::Io` - The file could not be opened or inspected
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound {
                location: path.display().to_string(),
            },
            _ => SourceError::Io(e),
        })?;
        let size = file.metadata().await?.len();
        debug!("Opened file source {} ({} bytes)", path.display(), size);

        Ok(Self {
            file,
            path,
            position: 0,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError> {
        let remaining = self.size.saturating_sub(self.position);
        let to_read = (max_bytes as u64).min(remaining) as usize;
        if to_read == 0 {
            return Ok(Bytes::new());
        }

        let mut chunk = vec![0u8; to_read];
        let read = self.file.read(&mut chunk).await?;
        chunk.truncate(read);
        self.position += read as u64;
        Ok(Bytes::from(chunk))
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SourceError> {
        let target = resolve_seek(self.position, Some(self.size), offset, whence)?;
        self.file.seek(std::io::SeekFrom::Start(target)).await?;
        self.position = target;
        Ok(target)
    }

    async fn size(&mut self) -> Result<Option<u64>, SourceError> {
        Ok(Some(self.size))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_file_source_reads_and_seeks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut source = FileSource::open(file.path()).await.unwrap();
        assert_eq!(source.size().await.unwrap(), Some(10));
        assert_eq!(source.read(4).await.unwrap(), Bytes::from_static(b"0123"));

        assert_eq!(source.seek(2, Whence::Current).await.unwrap(), 6);
        assert_eq!(source.read(100).await.unwrap(), Bytes::from_static(b"6789"));
        assert!(source.read(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path().join("absent.wav"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }
}
