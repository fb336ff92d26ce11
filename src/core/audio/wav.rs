//! Canonical audio container encoding.
//!
//! Everything that leaves the normalizer is framed the same way: mono,
//! 16-bit signed little-endian PCM at the 8 kHz telephony rate, wrapped in a
//! standard WAV container that any compliant reader can decode.

use std::io::Cursor;

/// Telephony frame rate assumed throughout the pipeline.
pub const FRAME_RATE_HZ: u32 = 8000;

/// Single channel audio only.
pub const CHANNELS: u16 = 1;

/// 16-bit samples.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Wrap little-endian 16-bit PCM bytes into a canonical WAV byte stream.
///
/// The input length must be a multiple of two (one sample per two bytes);
/// an odd-length buffer is a caller contract violation and is rejected
/// rather than silently truncated.
pub fn encode_pcm(pcm: &[u8]) -> Result<Vec<u8>, hound::Error> {
    if pcm.len() % 2 != 0 {
        return Err(hound::Error::Unsupported);
    }

    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: FRAME_RATE_HZ,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
