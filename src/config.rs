//! Server configuration.
//!
//! Configuration comes from environment variables (after an optional `.env`
//! file has been loaded by the binary). Every knob has a default that works
//! for local development; deployments override what they need.
//!
//! | Variable               | Default                        | Meaning                                   |
//! |------------------------|--------------------------------|-------------------------------------------|
//! | `HOST`                 | `0.0.0.0`                      | Bind address                              |
//! | `PORT`                 | `8000`                         | Bind port                                 |
//! | `WHISPER_MODEL_SIZE`   | `base`                         | Default model size class                  |
//! | `MODEL_CACHE_PATH`     | `<tmp>/whisper-models`         | Model artifact cache directory            |
//! | `PRELOAD_MODEL`        | `true`                         | Load the default model at startup         |
//! | `CORS_ALLOWED_ORIGINS` | `*`                            | Allowed CORS origins (`*` or CSV list)    |
//! | `PHONE_PROMPT`         | built-in phone-call prompt     | Prompt for `/transcribe-optimized`        |

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::core::SizeClass;

/// Default decoding prompt for the phone-call preset endpoint.
const DEFAULT_PHONE_PROMPT: &str = "Caller is speaking about salon services or booking \
     appointments. Focus on clear human speech and maintain natural conversation flow. \
     Ignore background noise, dial tones, and audio artifacts.";

/// Configuration errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Fixed option set for the phone-call preset endpoint.
///
/// The preset endpoint is the same pipeline as `/transcribe`; only this
/// configuration data differs.
#[derive(Debug, Clone)]
pub struct PhonePreset {
    /// Size class used for phone calls (speed over peak accuracy).
    pub size_class: SizeClass,
    /// Phone calls are transcribed with a fixed language.
    pub language: String,
    /// Context prompt steering the decoder towards call audio.
    pub prompt: String,
}

impl Default for PhonePreset {
    fn default() -> Self {
        Self {
            size_class: SizeClass::Base,
            language: "en".to_string(),
            prompt: DEFAULT_PHONE_PROMPT.to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Size class used when a request does not ask for one.
    pub default_size_class: SizeClass,

    /// Directory model artifacts are downloaded into.
    pub model_cache_path: PathBuf,

    /// Whether to load the default model eagerly at startup.
    pub preload_model: bool,

    /// CORS allowed origins: `*` for all, or a comma-separated list.
    /// `None` disables cross-origin access entirely.
    pub cors_allowed_origins: Option<String>,

    /// Options applied by the phone-call preset endpoint.
    pub phone: PhonePreset,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            default_size_class: SizeClass::Base,
            model_cache_path: std::env::temp_dir().join("whisper-models"),
            preload_model: true,
            cors_allowed_origins: Some("*".to_string()),
            phone: PhonePreset::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = non_empty_var("HOST") {
            config.host = host;
        }

        if let Some(port) = non_empty_var("PORT") {
            config.port = parse_port(&port)?;
        }

        if let Some(size) = non_empty_var("WHISPER_MODEL_SIZE") {
            config.default_size_class =
                SizeClass::from_str(&size).map_err(|e| ConfigError::Invalid {
                    key: "WHISPER_MODEL_SIZE".to_string(),
                    message: e.to_string(),
                })?;
        }

        if let Some(path) = non_empty_var("MODEL_CACHE_PATH") {
            config.model_cache_path = PathBuf::from(path);
        }

        if let Some(preload) = non_empty_var("PRELOAD_MODEL") {
            config.preload_model = parse_bool("PRELOAD_MODEL", &preload)?;
        }

        if let Some(origins) = non_empty_var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = Some(origins);
        }

        if let Some(prompt) = non_empty_var("PHONE_PROMPT") {
            config.phone.prompt = prompt;
        }

        Ok(config)
    }

    /// The socket address string to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    let port: u16 = value.parse().map_err(|_| ConfigError::Invalid {
        key: "PORT".to_string(),
        message: format!("`{value}` is not a valid port number"),
    })?;
    if port == 0 {
        return Err(ConfigError::Invalid {
            key: "PORT".to_string(),
            message: "port 0 is not bindable".to_string(),
        });
    }
    Ok(port)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("`{other}` is not a boolean"),
        }),
    }
}
