//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_PROFILE, DEFAULT_SERVER_URL, PUSH_ATTEMPTS, PUSH_BACKOFF, RECONNECT_INITIAL, RECONNECT_MAX,
    REQUEST_TIMEOUT,
};

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://127.0.0.1:3001`. `/api/...` is appended.
    pub server_url: String,
    /// Directory backing the local persistence adapter.
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub push_attempts: u32,
    pub push_backoff: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_profile(DEFAULT_SERVER_URL, DEFAULT_PROFILE)
    }
}

impl ClientConfig {
    /// Defaults with local data under `<platform data dir>/gramseva/<profile>`.
    pub fn for_profile(server_url: impl Into<String>, profile: &str) -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(server_url, base.join("gramseva").join(profile))
    }

    pub fn new(server_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            data_dir: data_dir.into(),
            request_timeout: REQUEST_TIMEOUT,
            push_attempts: PUSH_ATTEMPTS,
            push_backoff: PUSH_BACKOFF,
            reconnect_initial: RECONNECT_INITIAL,
            reconnect_max: RECONNECT_MAX,
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.server_url, path.trim_start_matches('/'))
    }

    /// Realtime endpoint: the base URL with `http` swapped for `ws`.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.server_url.clone()
        };
        format!("{base}/api/ws")
    }
}
