pub mod audio;
pub mod engine;
pub mod transcriber;

// Re-export commonly used types for convenience
pub use audio::{AudioPayload, normalize};
pub use engine::{
    EngineError, EngineLoader, EngineOutput, EngineRegistry, SizeClass, TranscribeOptions,
    TranscriptSegment, TranscriptionEngine, WhisperEngine, WhisperEngineConfig, WhisperLoader,
};
pub use transcriber::{TranscribeError, TranscribeRequest, Transcriber, TranscriptionOutcome};
