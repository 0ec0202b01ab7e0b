//! Engine selection by header probing.

use std::sync::Arc;

use tracing::debug;

use super::{ContainerEngine, SymphoniaEngine};

/// Engines registered when the caller does not supply its own list.
pub fn default_engines() -> Vec<Arc<dyn ContainerEngine>> {
    vec![Arc::new(SymphoniaEngine)]
}

/// Returns the engine with the highest non-zero probe score for `header`.
/// Ties go to the engine registered first.
pub fn select_engine<'a>(
    engines: &'a [Arc<dyn ContainerEngine>],
    header: &[u8],
) -> Option<&'a Arc<dyn ContainerEngine>> {
    let mut best: Option<(&Arc<dyn ContainerEngine>, u8)> = None;
    for engine in engines {
        let score = engine.probe(header);
        debug!("Probe score {} for engine {}", score, engine.name());
        if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((engine, score));
        }
    }
    best.map(|(engine, _)| engine)
}
