//! Transcription endpoints.
//!
//! `POST /transcribe` accepts a multipart upload (field `file`) plus query
//! parameters and runs the full pipeline. `POST /transcribe-optimized` is
//! the same pipeline with the phone-call preset from configuration applied.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::{
    AudioPayload, SizeClass, TranscribeError, TranscribeOptions, TranscribeRequest,
    TranscriptSegment, TranscriptionOutcome,
};
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Query parameters for `/transcribe`.
#[derive(Debug, Default, Deserialize)]
pub struct TranscribeParams {
    /// Model size class; the configured default when absent.
    pub model_size: Option<String>,
    /// ISO language code; absent means auto-detect.
    pub language: Option<String>,
    /// Sampling temperature, >= 0. Defaults to 0 (deterministic).
    pub temperature: Option<f32>,
    /// Optional decoding context prompt.
    pub prompt: Option<String>,
}

/// Query parameters for `/transcribe-optimized`.
#[derive(Debug, Default, Deserialize)]
pub struct OptimizedParams {
    /// Overrides the configured phone-call prompt when present.
    pub prompt: Option<String>,
}

/// Transcription response body.
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    /// Full transcript, trimmed.
    pub text: String,
    /// Mean per-segment log-probability; `null` when unavailable.
    pub avg_logprob: Option<f64>,
    /// Ordered transcript segments.
    pub segments: Vec<TranscriptSegment>,
    /// Wall-clock seconds spent on this request.
    pub processing_time: f64,
}

impl From<TranscriptionOutcome> for TranscribeResponse {
    fn from(outcome: TranscriptionOutcome) -> Self {
        Self {
            text: outcome.text,
            avg_logprob: outcome.avg_logprob,
            segments: outcome.segments,
            processing_time: outcome.processing_time,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map pipeline failures onto HTTP statuses: bad options are the caller's
/// fault, load failures are retriable service unavailability, inference
/// failures are internal.
fn map_transcribe_error(err: TranscribeError) -> HandlerError {
    let status = match &err {
        TranscribeError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
        TranscribeError::EngineLoad { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TranscribeError::Inference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(error = %err, "transcription request failed");
    error_response(status, err.to_string())
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /transcribe` - transcribe an uploaded audio file.
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TranscribeParams>,
    multipart: Multipart,
) -> Result<Json<TranscribeResponse>, HandlerError> {
    let payload = extract_audio_payload(multipart).await?;

    let size_class = match params.model_size.as_deref() {
        Some(raw) => SizeClass::from_str(raw)
            // An unknown identifier fails the engine-load step, the same way
            // a class the loader cannot construct would.
            .map_err(|e| error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?,
        None => state.config.default_size_class,
    };

    let request = TranscribeRequest {
        size_class,
        options: TranscribeOptions {
            language: params.language,
            temperature: params.temperature.unwrap_or(0.0),
            prompt: params.prompt,
        },
    };

    run_transcription(&state, payload, request).await
}

/// `POST /transcribe-optimized` - transcribe a phone call with the
/// configured preset (size class, language, prompt).
pub async fn transcribe_optimized_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OptimizedParams>,
    multipart: Multipart,
) -> Result<Json<TranscribeResponse>, HandlerError> {
    let payload = extract_audio_payload(multipart).await?;

    let preset = &state.config.phone;
    let request = TranscribeRequest {
        size_class: preset.size_class,
        options: TranscribeOptions {
            language: Some(preset.language.clone()),
            temperature: 0.0,
            prompt: Some(params.prompt.unwrap_or_else(|| preset.prompt.clone())),
        },
    };

    run_transcription(&state, payload, request).await
}

async fn run_transcription(
    state: &AppState,
    payload: AudioPayload,
    request: TranscribeRequest,
) -> Result<Json<TranscribeResponse>, HandlerError> {
    debug!(
        bytes = payload.data.len(),
        content_type = payload.content_type.as_deref().unwrap_or("-"),
        filename = payload.filename.as_deref().unwrap_or("-"),
        size_class = %request.size_class,
        "transcription request received"
    );

    state
        .transcriber
        .transcribe(payload, request)
        .await
        .map(|outcome| Json(outcome.into()))
        .map_err(map_transcribe_error)
}

/// Pull the `file` part out of the multipart body.
async fn extract_audio_payload(mut multipart: Multipart) -> Result<AudioPayload, HandlerError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("malformed multipart body: {e}"),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("failed to read upload: {e}"),
            )
        })?;

        return Ok(AudioPayload::new(data, content_type, filename));
    }

    Err(error_response(
        StatusCode::BAD_REQUEST,
        "multipart field `file` is required",
    ))
}
