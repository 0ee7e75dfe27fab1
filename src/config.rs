//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Backend address used when `DATAR_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Client configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the DATAR backend, without a trailing slash.
    pub api_base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Directory for rolling log files. Logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: None,
            log_dir: None,
        }
    }
}

impl ClientConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = match lookup("DATAR_API_URL") {
            Some(url) => normalize_base_url(&url)?,
            None => DEFAULT_API_URL.to_string(),
        };

        let request_timeout = match lookup("DATAR_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "DATAR_REQUEST_TIMEOUT_SECS".into(),
                    message: format!("expected a whole number of seconds, got {raw:?}"),
                })?;
                // 0 means "no timeout", same as leaving it unset
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let log_dir = lookup("DATAR_LOG_DIR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_base_url,
            request_timeout,
            log_dir,
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "DATAR_API_URL".into(),
            message: format!("expected an http(s) URL, got {raw:?}"),
        });
    }
    Ok(url.to_string())
}
