//! HTTP request handlers
//!
//! - `health` - liveness probe reporting engine load state
//! - `transcribe` - audio upload transcription endpoints

pub mod health;
pub mod transcribe;

pub use health::health_check;
pub use transcribe::{transcribe_handler, transcribe_optimized_handler};
