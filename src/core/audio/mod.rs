//! Audio normalization pipeline.
//!
//! Converts whatever the caller uploads into the one framing the rest of the
//! service understands: mono, 16-bit signed little-endian PCM at 8 kHz in a
//! standard WAV container.

pub mod mulaw;
pub mod normalizer;
pub mod wav;

pub use normalizer::{AudioPayload, MULAW_CONTENT_TYPE, MULAW_EXTENSION, normalize};
pub use wav::{BITS_PER_SAMPLE, CHANNELS, FRAME_RATE_HZ, encode_pcm};
