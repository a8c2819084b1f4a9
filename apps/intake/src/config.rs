use anyhow::{Context, Result};

use crate::search::DEFAULT_DEBOUNCE_MS;
use crate::upload::validation::MAX_FILE_BYTES;

const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the external transfer/parsing service.
    pub transfer_service_url: String,
    /// Base URL for resume content retrieval. Defaults to the transfer service.
    pub resume_api_url: String,
    pub api_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub max_file_bytes: u64,
    /// Upper bound on a selection request body, across all files in it.
    pub max_request_bytes: usize,
    pub search_debounce_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let transfer_service_url = require_env("TRANSFER_SERVICE_URL")?;
        Ok(Config {
            resume_api_url: std::env::var("RESUME_API_URL")
                .unwrap_or_else(|_| transfer_service_url.clone()),
            transfer_service_url,
            api_token: std::env::var("RESUME_API_TOKEN").ok().filter(|t| !t.is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_file_bytes: parse_env("MAX_FILE_BYTES", MAX_FILE_BYTES)?,
            max_request_bytes: parse_env("MAX_REQUEST_BYTES", DEFAULT_MAX_REQUEST_BYTES)?,
            search_debounce_ms: parse_env("SEARCH_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
