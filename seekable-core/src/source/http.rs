//! HTTP byte source built on range requests.
//!
//! Seeking is only possible when the server advertises `Accept-Ranges: bytes`.
//! The total size comes from `Content-Length` on a `HEAD` request, falling
//! back to the `Content-Range` total of a one-byte probe. Servers that report
//! neither are treated as unbounded.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::resolve_seek;
use crate::config::HttpConfig;
use crate::io::{ByteSource, SourceError, Whence};

/// Byte source reading a remote resource through HTTP range requests.
pub struct HttpRangeSource {
    client: Client,
    url: Url,
    position: u64,
    /// Outer `None` means the size has not been queried yet.
    size: Option<Option<u64>>,
}

impl HttpRangeSource {
    /// Creates a source with a client configured from `config`.
    ///
    /// # Errors
    ///
    /// - `SourceError::Network` - The HTTP client could not be built
    pub fn new(url: Url, config: &HttpConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(network_error)?;
        Ok(Self::with_client(client, url))
    }

    /// Creates a source sharing an existing client.
    pub fn with_client(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            position: 0,
            size: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn resolve_size(&mut self) -> Result<Option<u64>, SourceError> {
        if let Some(size) = self.size {
            return Ok(size);
        }

        let head = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(network_error)?;
        check_status(head.status(), &self.url)?;

        let accepts_bytes = head
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("bytes"));
        if !accepts_bytes {
            return Err(SourceError::RangeNotSupported {
                location: self.url.to_string(),
            });
        }

        let content_length = head
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let size = match content_length {
            Some(length) => Some(length),
            None => {
                let probe = self
                    .client
                    .get(self.url.clone())
                    .header(RANGE, "bytes=0-0")
                    .send()
                    .await
                    .map_err(network_error)?;
                check_status(probe.status(), &self.url)?;
                probe
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_content_range_total)
            }
        };

        debug!("Resolved size of {}: {:?}", self.url, size);
        self.size = Some(size);
        Ok(size)
    }
}

#[async_trait]
impl ByteSource for HttpRangeSource {
    async fn read(&mut self, max_bytes: usize) -> Result<Bytes, SourceError> {
        let size = self.resolve_size().await?;
        let to_read = match size {
            Some(size) => (max_bytes as u64).min(size.saturating_sub(self.position)),
            None => max_bytes as u64,
        };
        if to_read == 0 {
            return Ok(Bytes::new());
        }

        let end = self.position + to_read - 1;
        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={}-{}", self.position, end))
            .send()
            .await
            .map_err(network_error)?;
        check_status(response.status(), &self.url)?;

        // A full-body answer to a mid-file range means the range was ignored
        if response.status() == StatusCode::OK && self.position > 0 {
            return Err(SourceError::RangeNotSupported {
                location: self.url.to_string(),
            });
        }

        let mut body = response.bytes().await.map_err(network_error)?;
        body.truncate(to_read as usize);
        self.position += body.len() as u64;
        Ok(body)
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, SourceError> {
        let size = self.resolve_size().await?;
        self.position = resolve_seek(self.position, size, offset, whence)?;
        Ok(self.position)
    }

    async fn size(&mut self) -> Result<Option<u64>, SourceError> {
        self.resolve_size().await
    }
}

fn network_error(error: reqwest::Error) -> SourceError {
    SourceError::Network {
        reason: error.to_string(),
    }
}

fn check_status(status: StatusCode, url: &Url) -> Result<(), SourceError> {
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound {
            location: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(SourceError::Network {
            reason: format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
        });
    }
    Ok(())
}

/// Extracts the total length from a `Content-Range` value such as
/// `bytes 0-0/12345`. An unknown total (`*`) yields `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/12345"), Some(12345));
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_check_status_mapping() {
        let url = Url::parse("http://localhost/a.mp3").unwrap();

        assert!(check_status(StatusCode::PARTIAL_CONTENT, &url).is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, &url),
            Err(SourceError::NotFound { .. })
        ));
        match check_status(StatusCode::SERVICE_UNAVAILABLE, &url) {
            Err(SourceError::Network { reason }) => assert!(reason.starts_with("503")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
