//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::{EngineLoader, Transcriber, WhisperEngineConfig, WhisperLoader};

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub transcriber: Transcriber,
}

impl AppState {
    /// Create application state wired to the production Whisper loader.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let loader = WhisperLoader::new(WhisperEngineConfig {
            cache_dir: config.model_cache_path.clone(),
        });
        Self::with_loader(config, Box::new(loader))
    }

    /// Create application state with a custom engine loader.
    ///
    /// This is the seam tests use to substitute a fake engine.
    pub fn with_loader(config: ServerConfig, loader: Box<dyn EngineLoader>) -> Arc<Self> {
        Arc::new(Self {
            config,
            transcriber: Transcriber::new(loader),
        })
    }
}
