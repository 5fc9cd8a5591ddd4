//! Client configuration
//!
//! Settings come from built-in defaults, overridden by environment variables
//! and command-line flags (see [`crate::cli::Cli`]).

use std::path::PathBuf;
use std::time::Duration;

/// Server used when no URL is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/";

/// Number of recommendations requested on each daily refresh
pub const RECOMMENDATIONS_PER_DAY: u32 = 100;

/// How long cached recommendations stay fresh, in milliseconds
pub const STALENESS_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Timeout applied to every API request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API server, always ending in `/`
    pub server_url: String,
    /// Session token issued by the server at login, forwarded as a cookie
    pub session_token: Option<String>,
    /// Directory for locally persisted data; `None` uses the platform default
    pub data_dir: Option<PathBuf>,
    /// Recommendations requested per refresh
    pub daily_quota: u32,
    /// Age after which cached recommendations are refreshed
    pub staleness_window: chrono::Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            session_token: None,
            data_dir: None,
            daily_quota: RECOMMENDATIONS_PER_DAY,
            staleness_window: chrono::Duration::milliseconds(STALENESS_WINDOW_MS),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Sets the server URL, normalizing it to end with a slash
    pub fn with_server_url(mut self, url: impl AsRef<str>) -> Self {
        self.server_url = normalize_server_url(url.as_ref());
        self
    }

    /// Sets the session token; blank tokens are ignored
    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Sets the local data directory
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }
}

/// Ensures a server URL ends with exactly one trailing slash so relative
/// endpoint paths can be appended directly
pub fn normalize_server_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return DEFAULT_SERVER_URL.to_string();
    }
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
