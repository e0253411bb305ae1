//! Sidecar configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortalConfig {
    /// Origin of the school backend; paths are joined as `{api_url}api/...`
    /// Env: PORTAL_API_URL
    /// Default: "http://localhost:5000/"
    pub api_url: String,

    /// Timeout for the student roster fetch, in seconds
    /// Env: PORTAL_ROSTER_TIMEOUT_SECS
    /// Default: 10
    pub roster_timeout_secs: u64,

    /// Timeout for every other backend call, in seconds
    /// Env: PORTAL_REQUEST_TIMEOUT_SECS
    /// Default: 30
    pub request_timeout_secs: u64,

    /// env_logger filter string
    /// Env: PORTAL_LOG
    /// Default: "info"
    pub log_filter: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/".to_string(),
            roster_timeout_secs: 10,
            request_timeout_secs: 30,
            log_filter: "info".to_string(),
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();
        config
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(url) = env::var("PORTAL_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }

        if let Ok(secs) = env::var("PORTAL_ROSTER_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.roster_timeout_secs = s;
            }
        }

        if let Ok(secs) = env::var("PORTAL_REQUEST_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.request_timeout_secs = s;
            }
        }

        if let Ok(filter) = env::var("PORTAL_LOG") {
            self.log_filter = filter;
        }
    }

    pub fn roster_timeout(&self) -> Duration {
        Duration::from_secs(self.roster_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full URL for an `api/...` path. Tolerates the base with or without a trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
