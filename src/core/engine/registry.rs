//! Engine lifecycle management.
//!
//! The registry owns at most one engine instance per size class for the
//! lifetime of the process. Loading is single-flight: the first request for
//! a class performs the construction while concurrent requests for the same
//! class wait for that outcome instead of triggering redundant loads. A
//! failed load leaves the class unloaded, so the next request simply
//! retries; one bad attempt does not poison the class.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::{EngineLoader, EngineResult, SizeClass, TranscriptionEngine};

type EngineCell = Arc<OnceCell<Arc<dyn TranscriptionEngine>>>;

/// Keyed registry of loaded transcription engines.
pub struct EngineRegistry {
    loader: Box<dyn EngineLoader>,
    engines: DashMap<SizeClass, EngineCell>,
}

impl EngineRegistry {
    /// Create a registry that constructs engines through `loader`.
    pub fn new(loader: Box<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engines: DashMap::new(),
        }
    }

    /// Return the engine for `size_class`, loading it on first use.
    ///
    /// Concurrent callers for the same class observe the same handle; only
    /// one underlying construction ever runs at a time per class.
    pub async fn get_or_load(
        &self,
        size_class: SizeClass,
    ) -> EngineResult<Arc<dyn TranscriptionEngine>> {
        let cell = self
            .engines
            .entry(size_class)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let engine = cell
            .get_or_try_init(|| async {
                info!(size_class = %size_class, "loading transcription engine");
                match self.loader.load(size_class).await {
                    Ok(engine) => {
                        info!(size_class = %size_class, "transcription engine loaded");
                        Ok(engine)
                    }
                    Err(e) => {
                        warn!(size_class = %size_class, error = %e, "engine load failed");
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(engine.clone())
    }

    /// Whether an engine is currently loaded for `size_class`.
    ///
    /// Read-only; never triggers a load.
    pub fn is_loaded(&self, size_class: SizeClass) -> bool {
        self.engines
            .get(&size_class)
            .is_some_and(|cell| cell.initialized())
    }

    /// Whether any engine instance is currently loaded.
    pub fn any_loaded(&self) -> bool {
        self.engines.iter().any(|entry| entry.value().initialized())
    }
}
