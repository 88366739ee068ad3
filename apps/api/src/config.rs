use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_READER_BASE_URL: &str = "https://r.jina.ai";

/// Application configuration loaded from environment variables.
///
/// The Anthropic key is optional at startup: generation endpoints refuse requests
/// with a configuration error while it is missing, everything else keeps serving.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub jina_api_key: Option<String>,
    pub reader_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub job_retention: Duration,
    pub max_upload_bytes: usize,
    pub generation: GenerationSettings,
}

/// Tuning constants for the generation pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    /// Output length the streaming progress estimate treats as "done".
    pub expected_response_chars: usize,
    /// Character budget per summarized website.
    pub website_char_budget: usize,
    /// Character budget per uploaded research document.
    pub file_char_budget: usize,
    pub max_competitors: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            expected_response_chars: 20_000,
            website_char_budget: 8_000,
            file_char_budget: 5_000,
            max_competitors: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            jina_api_key: None,
            reader_base_url: DEFAULT_READER_BASE_URL.to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            job_retention: Duration::from_secs(3600),
            max_upload_bytes: 25 * 1024 * 1024,
            generation: GenerationSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let generation = GenerationSettings {
            expected_response_chars: parse_env("EXPECTED_RESPONSE_CHARS", 20_000usize)?.max(1),
            ..GenerationSettings::default()
        };

        Ok(Config {
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            jina_api_key: optional_env("JINA_API_KEY"),
            reader_base_url: optional_env("READER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_READER_BASE_URL.to_string()),
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            job_retention: Duration::from_secs(parse_env("JOB_RETENTION_SECS", 3600u64)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 25 * 1024 * 1024usize)?,
            generation,
        })
    }
}

/// Reads a variable, treating an empty value the same as an unset one.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
