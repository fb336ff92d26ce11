//! Audio Test Fixtures
//!
//! Programmatically generated telephony audio test data. Generated audio
//! keeps tests reproducible, avoids external file dependencies, and gives
//! precise control over the signal.
//!
//! Audio format matches the pipeline's canonical framing:
//! - Sample rate: 8 kHz (telephony)
//! - Bit depth: 16-bit signed PCM
//! - Channels: Mono

use std::f32::consts::PI;

/// Telephony sample rate (8 kHz).
pub const SAMPLE_RATE: u32 = 8000;

/// One second of audio, in samples.
pub const SECOND: usize = 8000;

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate silence as raw little-endian bytes
pub fn generate_silence_bytes(duration_samples: usize) -> Vec<u8> {
    samples_to_bytes(&generate_silence(duration_samples))
}

/// Generate a sine wave tone
pub fn generate_sine_wave(duration_samples: usize, frequency: f32, amplitude: f32) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    let angular_freq = 2.0 * PI * frequency / SAMPLE_RATE as f32;

    (0..duration_samples)
        .map(|i| ((angular_freq * i as f32).sin() * max_amplitude) as i16)
        .collect()
}

/// A mu-law payload of all 0xFF bytes, which decodes to pure silence.
pub fn mulaw_silence(duration_samples: usize) -> Vec<u8> {
    vec![0xFFu8; duration_samples]
}

/// Convert i16 samples to little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert little-endian bytes to i16 samples
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Create a complete canonical WAV file (mono, 16-bit, 8 kHz) from samples
pub fn create_wav_file(samples: &[i16]) -> Vec<u8> {
    let data = samples_to_bytes(samples);
    let data_size = data.len() as u32;
    let byte_rate = SAMPLE_RATE * 2; // mono, 16-bit
    let block_align: u16 = 2;
    let bits_per_sample: u16 = 16;

    let mut wav = Vec::with_capacity(44 + data.len());

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend(data);

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_generation() {
        let silence = generate_silence(SECOND);
        assert_eq!(silence.len(), SECOND);
        assert!(silence.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_sine_wave_generation() {
        let sine = generate_sine_wave(SECOND, 440.0, 0.5);
        assert_eq!(sine.len(), SECOND);
        assert!(sine.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_samples_bytes_round_trip() {
        let samples = vec![0i16, 1000, -1000, i16::MAX, i16::MIN];
        assert_eq!(bytes_to_samples(&samples_to_bytes(&samples)), samples);
    }

    #[test]
    fn test_wav_file_structure() {
        let wav = create_wav_file(&generate_silence(SECOND));
        assert_eq!(wav.len(), 44 + SECOND * 2);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }
}
