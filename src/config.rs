use std::time::Duration;

use log::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the story service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL of the story API, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout for every call to the service.
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    /// Defaults, overridden by `WAYFINDER_API_URL` and `WAYFINDER_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var("WAYFINDER_API_URL").ok().as_deref(),
            std::env::var("WAYFINDER_TIMEOUT_SECS").ok().as_deref(),
        )
    }

    /// Apply optional overrides on top of this config. An unparseable timeout
    /// is ignored with a warning.
    pub fn with_overrides(mut self, base_url: Option<&str>, timeout_secs: Option<&str>) -> Self {
        if let Some(url) = base_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = timeout_secs {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid timeout '{raw}', keeping {:?}", self.timeout),
            }
        }
        self
    }
}
