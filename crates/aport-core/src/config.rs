//! Client configuration.
//!
//! `ClientConfig` is the static configuration a `VerificationClient` reads at
//! construction and never mutates. It can be built in code, from `APORT_*`
//! environment variables, or from a TOML file:
//!
//! ```toml
//! api_key = "ak_live_..."
//! base_url = "https://api.aport.io"
//! timeout_ms = 5000
//! ```
//!
//! `CallOptions` carries the per-call overrides: timeout, cancellation, and
//! idempotency key.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use aport_contracts::error::{AportError, AportResult};

use crate::cancel::CancelSignal;

pub const DEFAULT_BASE_URL: &str = "https://api.aport.io";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const ENV_API_KEY: &str = "APORT_API_KEY";
pub const ENV_BASE_URL: &str = "APORT_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "APORT_TIMEOUT_MS";

/// Static client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bearer credential. Optional for verify and read calls, required for
    /// issue, suspend, and direct passport lookup.
    pub api_key: Option<String>,
    /// Service root without a trailing slash.
    pub base_url: String,
    /// Default per-call timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// On-disk shape of a TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Read `APORT_API_KEY`, `APORT_BASE_URL`, and `APORT_TIMEOUT_MS`.
    ///
    /// Unset or empty variables fall back to defaults.
    pub fn from_env() -> AportResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> AportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_ms = match get(ENV_TIMEOUT_MS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| AportError::ConfigError {
                reason: format!("{} must be an integer number of milliseconds: {}", ENV_TIMEOUT_MS, e),
            })?),
            None => None,
        };

        Self::from_file_config(FileConfig {
            api_key: get(ENV_API_KEY),
            base_url: get(ENV_BASE_URL),
            timeout_ms,
        })
    }

    /// Parse `s` as a TOML configuration document.
    pub fn from_toml_str(s: &str) -> AportResult<Self> {
        let file: FileConfig = toml::from_str(s).map_err(|e| AportError::ConfigError {
            reason: format!("failed to parse client config TOML: {}", e),
        })?;
        Self::from_file_config(file)
    }

    /// Read and parse the TOML configuration file at `path`.
    pub fn from_file(path: &Path) -> AportResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AportError::ConfigError {
            reason: format!("failed to read client config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn from_file_config(file: FileConfig) -> AportResult<Self> {
        let defaults = Self::default();
        Self {
            api_key: file.api_key,
            base_url: file.base_url.unwrap_or(defaults.base_url),
            timeout: file
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        }
        .validate()
    }

    /// Check and normalize the configuration.
    ///
    /// The base URL must parse as an absolute `http` or `https` URL with a
    /// host; a trailing `/` is stripped. The timeout must be non-zero. An
    /// empty API key counts as none.
    pub fn validate(mut self) -> AportResult<Self> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        let url = Url::parse(&trimmed).map_err(|e| AportError::ConfigError {
            reason: format!("base URL '{}' is invalid: {}", self.base_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") || !url.host_str().is_some_and(|h| !h.is_empty()) {
            return Err(AportError::ConfigError {
                reason: format!("base URL '{}' must be an absolute http(s) URL", self.base_url),
            });
        }
        self.base_url = trimmed;

        if self.timeout.is_zero() {
            return Err(AportError::ConfigError {
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.api_key = None;
        }

        Ok(self)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides `ClientConfig::timeout` for this call.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelSignal>,
    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: Option<String>,
}

impl CallOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
