//! Environment-driven configuration with hard defaults.
//! All knobs are read once at startup; nothing else in the crate touches
//! the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_STATE_DIR: &str = ".mediportal";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the identity backend (the `/api/auth` service).
    pub api_url: String,
    /// Directory holding the persisted session snapshot.
    pub state_dir: PathBuf,
    /// Per-request timeout; an elapsed timeout classifies as unreachable.
    pub http_timeout: Duration,
}

impl PortalConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("MEDIPORTAL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let state_dir = env::var("MEDIPORTAL_STATE_DIR").unwrap_or_else(|_| DEFAULT_STATE_DIR.to_string());
        let timeout_secs = env::var("MEDIPORTAL_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        Self {
            api_url,
            state_dir: PathBuf::from(state_dir),
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}
