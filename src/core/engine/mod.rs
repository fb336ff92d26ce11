//! Transcription engine abstraction.
//!
//! The engine is an opaque capability from the orchestrator's point of view:
//! hand it canonical audio bytes plus decoding options, get back text and
//! segments. This module defines that contract, the closed set of model size
//! classes, and the loader trait the lifecycle registry uses to construct
//! engine instances.
//!
//! The production implementation is [`whisper::WhisperEngine`]; tests
//! substitute mock implementations through [`EngineLoader`].

mod registry;
pub mod whisper;

pub use registry::EngineRegistry;
pub use whisper::{WhisperEngine, WhisperEngineConfig, WhisperLoader};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while loading or running a transcription engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested size class is not one of the supported identifiers.
    #[error(
        "unsupported model size class `{0}`. Supported classes: tiny, base, small, medium, large"
    )]
    UnsupportedSizeClass(String),

    /// Engine construction failed (model download, weight loading, ...).
    #[error("engine load failed: {0}")]
    LoadFailed(String),

    /// The supplied audio could not be decoded by the engine.
    #[error("audio decoding failed: {0}")]
    AudioDecodeFailed(String),

    /// Inference itself failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Size classes
// =============================================================================

/// Whisper model size classes, trading accuracy for speed and memory.
///
/// The set is closed: identifiers are compared exactly and anything outside
/// it fails the engine-load step rather than silently defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// Smallest and fastest model.
    Tiny,
    /// Balanced speed and accuracy; the service default.
    #[default]
    Base,
    Small,
    Medium,
    /// Highest accuracy, slowest. `large-v3` is accepted as an alias.
    Large,
}

impl SizeClass {
    /// All supported size classes, in ascending model size.
    pub const ALL: [SizeClass; 5] = [
        SizeClass::Tiny,
        SizeClass::Base,
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
    ];

    /// The canonical identifier for this class.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Hugging Face Hub model repository for this class.
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::Tiny => "openai/whisper-tiny",
            Self::Base => "openai/whisper-base",
            Self::Small => "openai/whisper-small",
            Self::Medium => "openai/whisper-medium",
            Self::Large => "openai/whisper-large-v3",
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SizeClass {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "base" => Ok(Self::Base),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" | "large-v3" => Ok(Self::Large),
            other => Err(EngineError::UnsupportedSizeClass(other.to_string())),
        }
    }
}

// =============================================================================
// Options and output
// =============================================================================

/// Per-request decoding options forwarded to the engine.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    /// ISO language code. `None` lets the model condition freely
    /// (auto-detect).
    pub language: Option<String>,
    /// Sampling temperature; `0.0` decodes greedily.
    pub temperature: f32,
    /// Optional free-text context prepended to decoding.
    pub prompt: Option<String>,
}

/// One span of transcribed audio with timing and confidence metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment index, 0-based.
    pub id: usize,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Transcribed text for this span.
    pub text: String,
    /// Average log-probability of the tokens chosen for this span, when the
    /// engine produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_logprob: Option<f64>,
}

/// Raw engine output before orchestrator shaping.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Full transcript, untrimmed.
    pub text: String,
    /// Ordered segments.
    pub segments: Vec<TranscriptSegment>,
}

// =============================================================================
// Traits
// =============================================================================

/// An opaque transcription capability.
///
/// Implementations must be safe to share across request tasks; any internal
/// single-threaded inference state has to be guarded by the implementation
/// (the registry hands the same instance to every concurrent caller).
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe a canonical audio container (or best-effort raw bytes).
    ///
    /// Word-level timestamps are never computed; only segment-level metadata
    /// is returned.
    async fn transcribe(
        &self,
        audio: &[u8],
        options: &TranscribeOptions,
    ) -> EngineResult<EngineOutput>;

    /// The size class this instance was loaded with.
    fn size_class(&self) -> SizeClass;
}

/// Factory for engine instances, one construction per size class.
///
/// The registry calls this at most once per class at a time; a returned
/// error leaves the class unloaded so the next request can retry.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self, size_class: SizeClass) -> EngineResult<Arc<dyn TranscriptionEngine>>;
}
