//! services/engine/src/config.rs
//!
//! Defines the engine's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    pub openai_api_key: String,
    pub explain_model: String,
    pub notes_model: String,
    pub quiz_model: String,
    pub slides_model: String,
    pub diagram_model: String,
    pub video_model: String,
    pub chat_model: String,
    pub image_model: String,
    /// Base URL of the public prompt-keyed image service used when the
    /// primary image endpoint fails.
    pub image_fallback_url: String,
    /// Upper bound on the number of source-text characters submitted with
    /// any single generation prompt.
    pub max_source_chars: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        // --- Per-feature model settings ---
        let explain_model =
            std::env::var("EXPLAIN_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let notes_model =
            std::env::var("NOTES_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let quiz_model = std::env::var("QUIZ_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let slides_model =
            std::env::var("SLIDES_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let diagram_model =
            std::env::var("DIAGRAM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let video_model = std::env::var("VIDEO_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let image_model =
            std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());

        let image_fallback_url = std::env::var("IMAGE_FALLBACK_URL")
            .unwrap_or_else(|_| "https://image.pollinations.ai/prompt".to_string());

        let max_source_chars = match std::env::var("MAX_SOURCE_CHARS") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                ConfigError::InvalidValue(
                    "MAX_SOURCE_CHARS".to_string(),
                    format!("'{}' is not a valid character count", raw),
                )
            })?,
            Err(_) => 8000,
        };

        Ok(Self {
            log_level,
            openai_api_key,
            explain_model,
            notes_model,
            quiz_model,
            slides_model,
            diagram_model,
            video_model,
            chat_model,
            image_model,
            image_fallback_url,
            max_source_chars,
        })
    }
}
