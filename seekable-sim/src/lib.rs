//! Seekable Simulation - Deterministic fixtures for bridge testing.
//!
//! Provides a byte source with failure and latency injection, a synthetic
//! multi-stream container with its own engine, and WAV fixture builders, so
//! the bridge can be tested end to end without network access or real media.

pub mod fixtures;
pub mod mock_source;
pub mod synthetic;

use std::sync::Arc;

use seekable_core::engine::{ContainerEngine, default_engines};
use seekable_core::{DemuxBridge, SeekableConfig};

pub use fixtures::WavFixture;
pub use mock_source::MockByteSource;
pub use synthetic::{SyntheticEngine, SyntheticMedia, SyntheticPacket, SyntheticStream};

/// Built-in engines plus [`SyntheticEngine`].
pub fn engines_with_synthetic() -> Vec<Arc<dyn ContainerEngine>> {
    let mut engines = default_engines();
    engines.push(Arc::new(SyntheticEngine));
    engines
}

/// Bridge able to open real media and synthetic containers.
pub fn simulation_bridge(config: SeekableConfig) -> DemuxBridge {
    DemuxBridge::with_engines(engines_with_synthetic(), config)
}
