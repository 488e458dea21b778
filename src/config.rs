//! Process configuration, read once at startup and passed down explicitly.

use std::borrow::Cow;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const BACKEND_URL_ENV: &str = "PHARMAGUARD_BACKEND_URL";
pub const TIMEOUT_SECS_ENV: &str = "PHARMAGUARD_TIMEOUT_SECS";
pub const MAX_UPLOAD_BYTES_ENV: &str = "PHARMAGUARD_MAX_UPLOAD_BYTES";

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: Cow<'static, str>,
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Cow::Borrowed(DEFAULT_BACKEND_URL),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let defaults = Self::default();
        let backend_url = read(BACKEND_URL_ENV)
            .map(Cow::Owned)
            .unwrap_or(defaults.backend_url);
        let request_timeout = read(TIMEOUT_SECS_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let max_upload_bytes = read(MAX_UPLOAD_BYTES_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.max_upload_bytes);

        Self {
            backend_url,
            request_timeout,
            max_upload_bytes,
        }
    }

    pub fn with_backend_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.backend_url = Cow::Owned(url);
        }
        self
    }
}
