//! Integration tests for Seekable
//!
//! These tests drive the bridge through its public handle-based API with
//! synthetic and WAV media, mock byte sources and a local HTTP server.

#[path = "support.rs"]
mod support;

#[path = "integration/bridge_lifecycle.rs"]
mod bridge_lifecycle;
#[path = "integration/failure_injection.rs"]
mod failure_injection;
#[path = "integration/http_source.rs"]
mod http_source;
#[path = "integration/metadata_normalization.rs"]
mod metadata_normalization;
#[path = "integration/packet_fetch.rs"]
mod packet_fetch;
#[path = "integration/range_streaming.rs"]
mod range_streaming;
#[path = "integration/wav_engine.rs"]
mod wav_engine;
