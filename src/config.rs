//! Runtime configuration read from environment variables (a `.env` file is
//! loaded first by `main`).

use crate::error::ConfigError;
use crate::gemini::{GeminiSettings, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
use crate::wizard::DEFAULT_PREFERENCE_SEED;
use std::{str::FromStr, time::Duration};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MOCK_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub gemini: GeminiSettings,
    pub generation_timeout: Duration,
    pub mock_delay: Duration,
    pub preference_seed_count: usize,
    pub submission_url: Option<String>,
}

impl AppConfig {
    /// - `PORT` (default 8080)
    /// - `GEMINI_API_BASE`, `GEMINI_MODEL`
    /// - `GENERATION_TIMEOUT_SECS` (default 60)
    /// - `MOCK_DELAY_MS` (default 1500)
    /// - `PREFERENCE_SEED_COUNT` (default 3)
    /// - `SUBMISSION_URL` (optional)
    ///
    /// The API key itself is not part of the config; it is read per request
    /// from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let generation_timeout = Duration::from_secs(parse_or(&lookup, "GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS)?);
        let gemini = GeminiSettings {
            base_url: non_empty("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            request_timeout: generation_timeout,
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            gemini,
            generation_timeout,
            mock_delay: Duration::from_millis(parse_or(&lookup, "MOCK_DELAY_MS", DEFAULT_MOCK_DELAY_MS)?),
            preference_seed_count: parse_or(&lookup, "PREFERENCE_SEED_COUNT", DEFAULT_PREFERENCE_SEED)?,
            submission_url: non_empty("SUBMISSION_URL"),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
