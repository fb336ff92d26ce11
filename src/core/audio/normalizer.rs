//! Inbound audio normalization.
//!
//! Uploads arrive either as raw mu-law telephony audio or as something a
//! standard decoder already understands (typically WAV). The normalizer
//! inspects the declared content type and filename, converts mu-law input
//! into the canonical container, and passes everything else through
//! untouched.
//!
//! Normalization is best-effort: a conversion failure is logged and the
//! original bytes are forwarded unchanged, so the engine gets a chance to
//! fail with a more specific diagnostic (or to cope with the raw bytes).

use bytes::Bytes;
use tracing::warn;

use super::{mulaw, wav};

/// Media type that marks an upload as mu-law encoded.
pub const MULAW_CONTENT_TYPE: &str = "audio/mulaw";

/// Filename suffix that marks an upload as mu-law encoded.
pub const MULAW_EXTENSION: &str = ".mulaw";

/// One uploaded audio payload, as received. Lives for a single request.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Raw upload bytes.
    pub data: Bytes,
    /// Declared content type, if the client sent one.
    pub content_type: Option<String>,
    /// Filename hint, if the client sent one.
    pub filename: Option<String>,
}

impl AudioPayload {
    pub fn new(data: Bytes, content_type: Option<String>, filename: Option<String>) -> Self {
        Self {
            data,
            content_type,
            filename,
        }
    }

    /// Whether the declared metadata marks this payload as mu-law audio.
    ///
    /// Either signal is sufficient: a `audio/mulaw` content type or a
    /// `.mulaw` filename suffix. Absent both, the payload is treated as
    /// already decodable.
    pub fn is_mulaw(&self) -> bool {
        if self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct == MULAW_CONTENT_TYPE)
        {
            return true;
        }
        self.filename
            .as_deref()
            .is_some_and(|name| name.ends_with(MULAW_EXTENSION))
    }
}

/// Normalize an uploaded payload into canonically framed audio bytes.
///
/// Mu-law payloads are decoded to linear PCM and wrapped into the canonical
/// mono/16-bit/8 kHz WAV container. Everything else is returned unchanged.
/// This function never fails: if conversion goes wrong the original bytes
/// are returned as-is.
pub fn normalize(payload: &AudioPayload) -> Bytes {
    if !payload.is_mulaw() {
        return payload.data.clone();
    }

    container_or_fallback(payload, convert_mulaw(&payload.data))
}

/// Decode mu-law bytes and wrap the resulting PCM in the canonical container.
fn convert_mulaw(data: &[u8]) -> Result<Vec<u8>, hound::Error> {
    wav::encode_pcm(&mulaw::decode(data))
}

fn container_or_fallback(
    payload: &AudioPayload,
    converted: Result<Vec<u8>, hound::Error>,
) -> Bytes {
    match converted {
        Ok(container) => Bytes::from(container),
        Err(e) => {
            warn!(
                bytes = payload.data.len(),
                error = %e,
                "mu-law conversion failed, forwarding original payload unchanged"
            );
            payload.data.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mulaw_payload(data: Vec<u8>) -> AudioPayload {
        AudioPayload::new(
            Bytes::from(data),
            Some(MULAW_CONTENT_TYPE.to_string()),
            Some("call.mulaw".to_string()),
        )
    }

    #[test]
    fn test_detection_by_content_type() {
        let payload = AudioPayload::new(
            Bytes::from_static(b"xx"),
            Some("audio/mulaw".to_string()),
            Some("upload.bin".to_string()),
        );
        assert!(payload.is_mulaw());
    }

    #[test]
    fn test_detection_by_extension() {
        let payload = AudioPayload::new(
            Bytes::from_static(b"xx"),
            Some("application/octet-stream".to_string()),
            Some("recording.mulaw".to_string()),
        );
        assert!(payload.is_mulaw());
    }

    #[test]
    fn test_no_signal_means_passthrough() {
        let payload = AudioPayload::new(
            Bytes::from_static(b"RIFFxxxxWAVE"),
            Some("audio/wav".to_string()),
            Some("audio.wav".to_string()),
        );
        assert!(!payload.is_mulaw());
        assert_eq!(normalize(&payload), payload.data);
    }

    #[test]
    fn test_missing_metadata_means_passthrough() {
        let payload = AudioPayload::new(Bytes::from_static(b"anything"), None, None);
        assert!(!payload.is_mulaw());
        assert_eq!(normalize(&payload), payload.data);
    }

    #[test]
    fn test_mulaw_is_wrapped_into_canonical_container() {
        let normalized = normalize(&mulaw_payload(vec![0xFF; 8000]));

        let reader = hound::WavReader::new(std::io::Cursor::new(normalized.to_vec())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 8000);
    }

    #[test]
    fn test_all_ff_mulaw_matches_zero_pcm_container() {
        // 0xFF decodes to 0, so the container must be byte-identical to one
        // built directly from an all-zero PCM buffer of the same length.
        let from_mulaw = normalize(&mulaw_payload(vec![0xFF; 1600]));
        let from_pcm = wav::encode_pcm(&vec![0u8; 3200]).unwrap();
        assert_eq!(from_mulaw.as_ref(), from_pcm.as_slice());
    }

    #[test]
    fn test_conversion_failure_falls_back_to_original_bytes() {
        let payload = mulaw_payload(vec![0x12, 0x34, 0x56]);
        let out = container_or_fallback(&payload, Err(hound::Error::Unsupported));
        assert_eq!(out, payload.data);
    }

    #[test]
    fn test_empty_mulaw_payload() {
        let normalized = normalize(&mulaw_payload(Vec::new()));
        let reader = hound::WavReader::new(std::io::Cursor::new(normalized.to_vec())).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
