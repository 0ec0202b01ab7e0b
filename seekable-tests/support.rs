//! Shared helpers for integration and end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use bytes::Bytes;
use seekable_core::SeekableConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Serves one in-memory file at `/media`.
struct MediaServerState {
    data: Bytes,
    accept_ranges: bool,
    range_requests: AtomicU64,
}

/// Handle to a running media server.
pub struct MediaServer {
    pub address: SocketAddr,
    state: Arc<MediaServerState>,
    task: JoinHandle<()>,
}

impl MediaServer {
    /// Starts a server that honours `Range` headers.
    pub async fn start(data: Bytes) -> Self {
        Self::start_with(data, true).await
    }

    /// Starts a server that always answers with the whole body and never
    /// advertises range support.
    pub async fn start_without_ranges(data: Bytes) -> Self {
        Self::start_with(data, false).await
    }

    async fn start_with(data: Bytes, accept_ranges: bool) -> Self {
        let state = Arc::new(MediaServerState {
            data,
            accept_ranges,
            range_requests: AtomicU64::new(0),
        });
        let app = Router::new()
            .route("/media", get(serve_media).head(head_media))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            address,
            state,
            task,
        }
    }

    pub fn url(&self) -> Url {
        self.url_for("/media")
    }

    pub fn url_for(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.address, path)).unwrap()
    }

    /// Number of `GET` requests that carried a `Range` header.
    pub fn range_requests(&self) -> u64 {
        self.state.range_requests.load(Ordering::Acquire)
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn head_media(State(state): State<Arc<MediaServerState>>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, state.data.len());
    if state.accept_ranges {
        builder = builder.header(header::ACCEPT_RANGES, "bytes");
    }
    builder.body(Body::empty()).unwrap()
}

async fn serve_media(
    State(state): State<Arc<MediaServerState>>,
    headers: HeaderMap,
) -> Response {
    let total = state.data.len() as u64;
    let range = headers.get(header::RANGE).and_then(parse_range);

    match range {
        Some((start, end)) if state.accept_ranges => {
            state.range_requests.fetch_add(1, Ordering::AcqRel);
            if start >= total {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{total}"))
                    .body(Body::empty())
                    .unwrap();
            }
            let end = end.unwrap_or(total - 1).min(total - 1);
            let body = state.data.slice(start as usize..=end as usize);
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{total}"),
                )
                .header(header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))
                .unwrap()
        }
        _ => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total)
            .body(Body::from(state.data.clone()))
            .unwrap(),
    }
}

/// Parses `bytes=start-` and `bytes=start-end`.
fn parse_range(value: &HeaderValue) -> Option<(u64, Option<u64>)> {
    let spec = value.to_str().ok()?.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

/// Configuration with a small working buffer so tests cross buffer
/// boundaries often.
pub fn small_buffer_config() -> SeekableConfig {
    let mut config = SeekableConfig::default();
    config.io.buffer_size = 4096;
    config
}
