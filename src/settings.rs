//! Runtime settings for the backend.
//!
//! These are process-level knobs loaded from the environment. The Rollbar
//! account credential is not one of them; it lives in backend storage and is
//! managed through the `config` path.

use crate::error::{BackendError, BackendResult};
use std::env;
use std::time::Duration;

/// Rollbar API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.rollbar.com/api/1";

/// Timeout shared by every upstream request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend runtime settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Rollbar API base URL
    pub base_url: String,
    /// Upstream request timeout
    pub request_timeout: Duration,
    /// User agent sent to the Rollbar API
    pub user_agent: String,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("rollbar-secrets/", env!("CARGO_PKG_VERSION")).to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl BackendSettings {
    /// Load settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> BackendResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let base_url = env::var("ROLLBAR_API_URL").unwrap_or(defaults.base_url);
        let request_timeout = Duration::from_secs(parse_env(
            "ROLLBAR_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);
        let user_agent = env::var("ROLLBAR_USER_AGENT").unwrap_or(defaults.user_agent);
        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);
        let json_logs = parse_env("LOG_JSON", defaults.json_logs)?;

        if request_timeout.is_zero() {
            return Err(BackendError::config(
                "ROLLBAR_REQUEST_TIMEOUT_SECS must be greater than zero",
            ));
        }

        Ok(Self {
            base_url,
            request_timeout,
            user_agent,
            log_level,
            json_logs,
        })
    }

    /// Set the Rollbar API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the upstream request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> BackendResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| BackendError::config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
