use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HelpdeskError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Config {
    pub api_url: Option<String>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub search_debounce_ms: Option<u64>,
    pub search_limit: Option<u32>,
}

/// Retry schedule for idempotent reads: `delay * attempt` between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).map_err(|e| HelpdeskError::ConfigRead {
                path: config_path.clone(),
                source: e,
            })?;

        Self::parse(&contents).map_err(|e| HelpdeskError::ConfigParse {
            path: config_path,
            source: e,
        })
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn config_path() -> Result<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn session_path() -> Result<PathBuf> {
        Self::config_dir().map(|dir| dir.join("session.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        ProjectDirs::from("", "", "helpdesk")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(HelpdeskError::NoConfigDir)
    }

    /// Get API URL with env var taking precedence over config file
    pub fn api_url(&self) -> Result<Url> {
        let raw = std::env::var("HELPDESK_API_URL")
            .ok()
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let url = Url::parse(&raw).map_err(|_| HelpdeskError::InvalidUrl(raw.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HelpdeskError::InvalidUrl(raw));
        }
        Ok(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            delay: Duration::from_millis(self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(
            self.search_debounce_ms
                .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS),
        )
    }

    pub fn search_limit(&self) -> u32 {
        self.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1)
    }
}
