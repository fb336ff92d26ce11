//! Local Whisper transcription engine.
//!
//! Runs Whisper-family models on the CPU via candle. Model artifacts
//! (config, tokenizer, safetensors weights, mel filter bank) are fetched
//! from the Hugging Face Hub into a configurable cache directory on first
//! load, so regular requests never touch the network.
//!
//! Inference is a blocking, CPU-bound, single-threaded operation: the model
//! sits behind a mutex and each request's decode runs on a blocking thread
//! while holding it. Concurrent requests against the same engine queue on
//! that mutex without stalling unrelated tasks.
//!
//! Decoding is greedy at temperature 0 and switches to
//! temperature-weighted sampling above it. Word-level timestamps are never
//! computed; segment boundaries fall on the model's 30-second windows.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use parking_lot::Mutex;
use rand::distributions::{Distribution, WeightedIndex};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::{
    EngineError, EngineLoader, EngineOutput, EngineResult, SizeClass, TranscribeOptions,
    TranscriptSegment, TranscriptionEngine,
};

/// Sample rate Whisper models expect.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Seconds of audio per inference window.
const CHUNK_SECONDS: f64 = 30.0;

/// Hub repository hosting precomputed mel filter banks.
const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";

/// Start-of-previous-context token used for prompt conditioning.
const SOT_PREV_TOKEN: &str = "<|startofprev|>";

/// Maximum tokens decoded per window.
const MAX_DECODE_TOKENS: usize = 224;

/// Fixed placement and storage configuration for engine loading.
///
/// Applied uniformly to every size class; requests cannot negotiate it.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Directory model artifacts are downloaded into and served from.
    pub cache_dir: PathBuf,
}

/// A loaded Whisper model ready for inference.
pub struct WhisperEngine {
    inner: Arc<EngineInner>,
    size_class: SizeClass,
}

struct EngineInner {
    /// The decoder carries a KV cache, so inference needs exclusive access.
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
}

impl WhisperEngine {
    /// Load the model for `size_class`, blocking until artifacts are
    /// available locally. Call from a blocking context.
    pub fn load(size_class: SizeClass, config: &WhisperEngineConfig) -> EngineResult<Self> {
        let device = Device::Cpu;
        let model_id = size_class.model_id();

        info!(
            model = model_id,
            cache_dir = %config.cache_dir.display(),
            "loading Whisper model"
        );

        let api = ApiBuilder::new()
            .with_cache_dir(config.cache_dir.clone())
            .with_progress(false)
            .build()
            .map_err(|e| EngineError::LoadFailed(format!("hub client: {e}")))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| EngineError::LoadFailed(format!("config.json: {e}")))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| EngineError::LoadFailed(format!("tokenizer.json: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| EngineError::LoadFailed(format!("model.safetensors: {e}")))?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| EngineError::LoadFailed(format!("read config: {e}")))?;
        let model_config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| EngineError::LoadFailed(format!("parse config: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::LoadFailed(format!("tokenizer: {e}")))?;

        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_file = mel_filters_file(model_config.num_mel_bins)?;
        let mel_path = mel_repo
            .get(mel_file)
            .map_err(|e| EngineError::LoadFailed(format!("{mel_file}: {e}")))?;
        let mel_bytes = std::fs::read(&mel_path)
            .map_err(|e| EngineError::LoadFailed(format!("mel filters: {e}")))?;
        let mel_filters = read_mel_filters(&mel_bytes, &model_config)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| EngineError::LoadFailed(format!("weights: {e}")))?
        };

        let model = m::model::Whisper::load(&vb, model_config.clone())
            .map_err(|e| EngineError::LoadFailed(format!("model: {e}")))?;

        info!(model = model_id, "Whisper model loaded");

        Ok(Self {
            inner: Arc::new(EngineInner {
                model: Mutex::new(model),
                tokenizer,
                config: model_config,
                device,
                mel_filters,
            }),
            size_class,
        })
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperEngine {
    async fn transcribe(
        &self,
        audio: &[u8],
        options: &TranscribeOptions,
    ) -> EngineResult<EngineOutput> {
        let inner = self.inner.clone();
        let audio = audio.to_vec();
        let options = options.clone();

        tokio::task::spawn_blocking(move || inner.run(&audio, &options))
            .await
            .map_err(|e| EngineError::InferenceFailed(format!("inference task: {e}")))?
    }

    fn size_class(&self) -> SizeClass {
        self.size_class
    }
}

impl EngineInner {
    fn run(&self, audio: &[u8], options: &TranscribeOptions) -> EngineResult<EngineOutput> {
        let samples = read_wav_mono_16k(audio)?;
        if samples.is_empty() {
            return Ok(EngineOutput::default());
        }

        let chunk_samples = m::N_SAMPLES;
        let n_mel = self.config.num_mel_bins;

        // Serialize inference: the decoder KV cache makes concurrent use of
        // one model instance unsound.
        let mut model = self.model.lock();

        let mut segments = Vec::new();
        for (i, chunk) in samples.chunks(chunk_samples).enumerate() {
            let padded;
            let window = if chunk.len() < chunk_samples {
                padded = {
                    let mut p = chunk.to_vec();
                    p.resize(chunk_samples, 0.0);
                    p
                };
                &padded[..]
            } else {
                chunk
            };

            let mel_data = m::audio::pcm_to_mel(&self.config, window, &self.mel_filters);
            let n_frames = mel_data.len() / n_mel;
            let mel = Tensor::from_vec(mel_data, (1, n_mel, n_frames), &self.device)
                .map_err(|e| EngineError::InferenceFailed(format!("mel tensor: {e}")))?;

            debug!(window = i, samples = chunk.len(), "decoding audio window");
            let (text, avg_logprob) = self.decode_window(&mut model, &mel, options)?;
            model.reset_kv_cache();

            if text.is_empty() {
                continue;
            }

            let start = i as f64 * CHUNK_SECONDS;
            segments.push(TranscriptSegment {
                id: segments.len(),
                start,
                end: start + chunk.len() as f64 / WHISPER_SAMPLE_RATE as f64,
                text,
                avg_logprob,
            });
        }

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(EngineOutput { text, segments })
    }

    /// Decode one 30-second mel window into text plus the average
    /// log-probability of the chosen tokens.
    fn decode_window(
        &self,
        model: &mut m::model::Whisper,
        mel: &Tensor,
        options: &TranscribeOptions,
    ) -> EngineResult<(String, Option<f64>)> {
        let audio_features = model
            .encoder
            .forward(mel, true)
            .map_err(|e| EngineError::InferenceFailed(format!("encoder: {e}")))?;

        let eot_token = self.token_id(m::EOT_TOKEN)?;
        let mut tokens = self.initial_tokens(options)?;
        let prompt_len = tokens.len();

        let mut rng = rand::thread_rng();
        let mut sum_logprob = 0.0f64;
        let mut sampled = 0usize;

        for step in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| EngineError::InferenceFailed(format!("token tensor: {e}")))?;

            let decoder_output = model
                .decoder
                .forward(&token_tensor, &audio_features, step == 0)
                .map_err(|e| EngineError::InferenceFailed(format!("decoder: {e}")))?;

            let logits = model
                .decoder
                .final_linear(
                    &decoder_output
                        .squeeze(0)
                        .map_err(|e| EngineError::InferenceFailed(e.to_string()))?,
                )
                .map_err(|e| EngineError::InferenceFailed(format!("final linear: {e}")))?;

            let seq_len = logits
                .dim(0)
                .map_err(|e| EngineError::InferenceFailed(e.to_string()))?;
            let last_logits = logits
                .get(seq_len - 1)
                .map_err(|e| EngineError::InferenceFailed(e.to_string()))?;

            let next_token = if options.temperature > 0.0 {
                let scaled = (&last_logits / options.temperature as f64)
                    .map_err(|e| EngineError::InferenceFailed(e.to_string()))?;
                let probabilities = candle_nn::ops::softmax(&scaled, 0)
                    .and_then(|t| t.to_vec1::<f32>())
                    .map_err(|e| EngineError::InferenceFailed(e.to_string()))?;
                let distribution = WeightedIndex::new(&probabilities)
                    .map_err(|e| EngineError::InferenceFailed(format!("sampling: {e}")))?;
                distribution.sample(&mut rng) as u32
            } else {
                last_logits
                    .argmax(0)
                    .and_then(|t| t.to_scalar::<u32>())
                    .map_err(|e| EngineError::InferenceFailed(e.to_string()))?
            };

            let log_probs = candle_nn::ops::log_softmax(&last_logits, 0)
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(|e| EngineError::InferenceFailed(e.to_string()))?;
            sum_logprob += f64::from(log_probs[next_token as usize]);
            sampled += 1;

            if next_token == eot_token {
                break;
            }
            tokens.push(next_token);
        }

        let decoded_ids = &tokens[prompt_len..];
        let text = self
            .tokenizer
            .decode(decoded_ids, true)
            .map_err(|e| EngineError::InferenceFailed(format!("detokenize: {e}")))?;

        let avg_logprob = (sampled > 0).then(|| sum_logprob / sampled as f64);
        Ok((text.trim().to_string(), avg_logprob))
    }

    /// Build the decoder conditioning sequence: optional prompt context,
    /// start-of-transcript, optional language token, task and timestamp
    /// markers.
    fn initial_tokens(&self, options: &TranscribeOptions) -> EngineResult<Vec<u32>> {
        let mut tokens = Vec::new();

        if let Some(prompt) = options.prompt.as_deref()
            && !prompt.trim().is_empty()
        {
            match self.tokenizer.token_to_id(SOT_PREV_TOKEN) {
                Some(sot_prev) => {
                    let encoded = self
                        .tokenizer
                        .encode(prompt, false)
                        .map_err(|e| EngineError::InferenceFailed(format!("prompt: {e}")))?;
                    let ids = encoded.get_ids();
                    // Whisper reserves half the token budget for context.
                    let keep = ids.len().min(MAX_DECODE_TOKENS / 2);
                    tokens.push(sot_prev);
                    tokens.extend_from_slice(&ids[ids.len() - keep..]);
                }
                None => {
                    warn!("tokenizer has no context token, ignoring prompt");
                }
            }
        }

        tokens.push(self.token_id(m::SOT_TOKEN)?);

        if let Some(language) = options.language.as_deref() {
            let token = format!("<|{language}|>");
            let id = self.tokenizer.token_to_id(&token).ok_or_else(|| {
                EngineError::InferenceFailed(format!(
                    "language `{language}` is not supported by this model"
                ))
            })?;
            tokens.push(id);
        }

        tokens.push(self.token_id(m::TRANSCRIBE_TOKEN)?);
        tokens.push(self.token_id(m::NO_TIMESTAMPS_TOKEN)?);
        Ok(tokens)
    }

    fn token_id(&self, token: &str) -> EngineResult<u32> {
        self.tokenizer
            .token_to_id(token)
            .ok_or_else(|| EngineError::InferenceFailed(format!("token not found: {token}")))
    }
}

/// Production loader: one blocking model construction per size class.
pub struct WhisperLoader {
    config: WhisperEngineConfig,
}

impl WhisperLoader {
    pub fn new(config: WhisperEngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLoader for WhisperLoader {
    async fn load(&self, size_class: SizeClass) -> EngineResult<Arc<dyn TranscriptionEngine>> {
        let config = self.config.clone();
        let engine =
            tokio::task::spawn_blocking(move || WhisperEngine::load(size_class, &config))
                .await
                .map_err(|e| EngineError::LoadFailed(format!("load task: {e}")))??;
        Ok(Arc::new(engine))
    }
}

// =============================================================================
// Audio and asset helpers
// =============================================================================

/// Pick the mel filter bank file matching the model's bin count.
fn mel_filters_file(num_mel_bins: usize) -> EngineResult<&'static str> {
    match num_mel_bins {
        80 => Ok("melfilters.bytes"),
        128 => Ok("melfilters128.bytes"),
        other => Err(EngineError::LoadFailed(format!(
            "unsupported mel bin count: {other}"
        ))),
    }
}

fn read_mel_filters(bytes: &[u8], config: &Config) -> EngineResult<Vec<f32>> {
    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(EngineError::LoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Read a WAV byte stream into mono f32 samples at the Whisper rate.
fn read_wav_mono_16k(data: &[u8]) -> EngineResult<Vec<f32>> {
    let mut reader = hound::WavReader::new(std::io::Cursor::new(data))
        .map_err(|e| EngineError::AudioDecodeFailed(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(EngineError::AudioDecodeFailed(format!(
            "unsupported sample format: {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let channels = spec.channels.max(1) as usize;
    let raw: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|e| EngineError::AudioDecodeFailed(e.to_string()))?;

    let mut mono = Vec::with_capacity(raw.len() / channels);
    for frame in raw.chunks(channels) {
        let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
        mono.push(sum as f32 / channels as f32 / i16::MAX as f32);
    }

    Ok(resample_linear(&mono, spec.sample_rate, WHISPER_SAMPLE_RATE))
}

/// Resample audio using linear interpolation.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::wav;

    #[test]
    fn test_mel_filters_file_selection() {
        assert_eq!(mel_filters_file(80).unwrap(), "melfilters.bytes");
        assert_eq!(mel_filters_file(128).unwrap(), "melfilters128.bytes");
        assert!(mel_filters_file(96).is_err());
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.0, 0.5, -0.5, 1.0];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_doubles_length() {
        let samples = vec![0.0f32; 8000];
        let resampled = resample_linear(&samples, 8000, 16_000);
        assert_eq!(resampled.len(), 16_000);
    }

    #[test]
    fn test_read_wav_rejects_garbage() {
        let err = read_wav_mono_16k(b"definitely not a wav file").unwrap_err();
        assert!(matches!(err, EngineError::AudioDecodeFailed(_)));
    }

    #[test]
    fn test_read_wav_resamples_canonical_container() {
        // 1 second of silence at the 8 kHz telephony rate becomes 1 second
        // at the 16 kHz inference rate.
        let container = wav::encode_pcm(&vec![0u8; 16_000]).unwrap();
        let samples = read_wav_mono_16k(&container).unwrap();
        assert_eq!(samples.len(), 16_000);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_read_wav_scales_to_unit_range() {
        let pcm: Vec<u8> = [i16::MAX, i16::MIN, 0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let container = wav::encode_pcm(&pcm).unwrap();
        let samples = read_wav_mono_16k(&container).unwrap();
        // 16 kHz output of 3 samples at 8 kHz input
        assert_eq!(samples.len(), 6);
        assert!((samples[0] - 1.0).abs() < 1e-4);
        assert!(samples.iter().all(|s| (-1.1..=1.1).contains(s)));
    }
}
