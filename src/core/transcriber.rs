//! Transcription orchestration.
//!
//! Drives one request end to end: validate options, obtain the engine for
//! the requested size class, normalize the upload, run inference, measure
//! elapsed time, and aggregate per-segment confidence into the response
//! shape.

use std::time::Instant;

use thiserror::Error;
use tracing::info;

use super::audio::{self, AudioPayload};
use super::engine::{
    EngineError, EngineLoader, EngineRegistry, SizeClass, TranscribeOptions, TranscriptSegment,
};

// =============================================================================
// Errors
// =============================================================================

/// Failures surfaced by the orchestrator, tagged by stage.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Request options were rejected before any work happened.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The engine for the requested size class could not be provided.
    /// Retriable: a failed load does not poison the class.
    #[error("engine unavailable for size class `{size_class}`: {source}")]
    EngineLoad {
        size_class: String,
        source: EngineError,
    },

    /// Inference failed on this payload.
    #[error("transcription failed: {source}")]
    Inference { source: EngineError },
}

// =============================================================================
// Request / result shapes
// =============================================================================

/// One transcription request, fully resolved.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub size_class: SizeClass,
    pub options: TranscribeOptions,
}

/// The shaped result of one transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    /// Full transcript, trimmed of leading/trailing whitespace.
    pub text: String,
    /// Segments exactly as the engine produced them.
    pub segments: Vec<TranscriptSegment>,
    /// Mean of the per-segment log-probabilities that are present; absent
    /// when no segment carries one.
    pub avg_logprob: Option<f64>,
    /// Wall-clock seconds spent serving this request.
    pub processing_time: f64,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Request orchestrator over the engine registry.
pub struct Transcriber {
    registry: EngineRegistry,
}

impl Transcriber {
    pub fn new(loader: Box<dyn EngineLoader>) -> Self {
        Self {
            registry: EngineRegistry::new(loader),
        }
    }

    /// Whether an engine is loaded for `size_class`. Side-effect free.
    pub fn is_loaded(&self, size_class: SizeClass) -> bool {
        self.registry.is_loaded(size_class)
    }

    /// Whether any engine is loaded. Side-effect free.
    pub fn any_loaded(&self) -> bool {
        self.registry.any_loaded()
    }

    /// Eagerly load the engine for `size_class` (startup warm-up).
    pub async fn preload(&self, size_class: SizeClass) -> Result<(), EngineError> {
        self.registry.get_or_load(size_class).await.map(|_| ())
    }

    /// Run one transcription end to end. Exactly one inference attempt; any
    /// load or inference failure propagates with its stage and cause.
    pub async fn transcribe(
        &self,
        payload: AudioPayload,
        request: TranscribeRequest,
    ) -> Result<TranscriptionOutcome, TranscribeError> {
        validate_options(&request.options)?;

        let started = Instant::now();

        let engine = self
            .registry
            .get_or_load(request.size_class)
            .await
            .map_err(|source| TranscribeError::EngineLoad {
                size_class: request.size_class.to_string(),
                source,
            })?;

        let audio = audio::normalize(&payload);

        let output = engine
            .transcribe(&audio, &request.options)
            .await
            .map_err(|source| TranscribeError::Inference { source })?;

        let processing_time = started.elapsed().as_secs_f64();
        let avg_logprob = average_logprob(&output.segments);

        info!(
            size_class = %request.size_class,
            chars = output.text.len(),
            segments = output.segments.len(),
            processing_time,
            "transcription complete"
        );

        Ok(TranscriptionOutcome {
            text: output.text.trim().to_string(),
            segments: output.segments,
            avg_logprob,
            processing_time,
        })
    }
}

fn validate_options(options: &TranscribeOptions) -> Result<(), TranscribeError> {
    if !options.temperature.is_finite() || options.temperature < 0.0 {
        return Err(TranscribeError::InvalidOptions(format!(
            "temperature must be a finite value >= 0.0, got {}",
            options.temperature
        )));
    }
    Ok(())
}

/// Arithmetic mean of the segment log-probabilities that are present.
///
/// Segments without one are ignored; `None` when nothing contributes.
fn average_logprob(segments: &[TranscriptSegment]) -> Option<f64> {
    let (sum, count) = segments.iter().fold((0.0f64, 0usize), |(sum, count), s| {
        match s.avg_logprob {
            Some(lp) => (sum + lp, count + 1),
            None => (sum, count),
        }
    });

    (count > 0).then(|| sum / count as f64)
}
