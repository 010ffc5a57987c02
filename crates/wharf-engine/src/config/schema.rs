use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wharf_common::protocol::DEFAULT_API_URL;

/// Origin scheme of Chromium extension pages.
pub const EXTENSION_ORIGIN_SCHEME: &str = "chrome-extension://";

/// Host process settings, read from `wharf.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    /// API endpoint used until the user configures one.
    #[serde(default = "default_api_url")]
    pub default_api_url: String,
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default = "default_badge_refresh_secs")]
    pub badge_refresh_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `Origin` values allowed to open the bridge socket. An entry ending in
    /// `://` admits the whole scheme.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            default_api_url: default_api_url(),
            state_path: None,
            badge_refresh_secs: default_badge_refresh_secs(),
            log_level: default_log_level(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl BridgeSettings {
    /// Where the durable state document lives: explicit setting, else
    /// `~/.wharf/state.json`, else `./wharf-state.json`.
    pub fn resolve_state_path(&self) -> PathBuf {
        if let Some(path) = &self.state_path {
            return path.clone();
        }
        match dirs::home_dir() {
            Some(home) => home.join(".wharf").join("state.json"),
            None => PathBuf::from("./wharf-state.json"),
        }
    }
}

fn default_port() -> u16 {
    9002
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_badge_refresh_secs() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Browser extension pages only.
pub fn default_allowed_origins() -> Vec<String> {
    vec![EXTENSION_ORIGIN_SCHEME.to_string()]
}
