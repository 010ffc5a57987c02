use crate::store::{Document, Store, StoreError};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use wharf_common::protocol::{Config, ConfigUpdate, DEFAULT_API_URL};

pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_API_URL: &str = "apiUrl";
pub const KEY_AUTO_CAPTURE: &str = "autoCapture";
pub const KEY_SHOW_NOTIFICATIONS: &str = "showNotifications";

pub const CONFIG_KEYS: [&str; 4] = [
    KEY_API_KEY,
    KEY_API_URL,
    KEY_AUTO_CAPTURE,
    KEY_SHOW_NOTIFICATIONS,
];

/// Reads and merges the user configuration. Unset keys read as their defaults.
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn Store>,
    default_api_url: String,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_default_api_url(store, DEFAULT_API_URL)
    }

    pub fn with_default_api_url(store: Arc<dyn Store>, default_api_url: impl Into<String>) -> Self {
        Self {
            store,
            default_api_url: default_api_url.into(),
        }
    }

    pub async fn get(&self) -> Result<Config, StoreError> {
        let doc = self.store.get(&CONFIG_KEYS).await?;

        // Values of the wrong type fall back to defaults, as does an empty URL.
        let api_key = string_value(&doc, KEY_API_KEY).unwrap_or_default();
        let api_url = string_value(&doc, KEY_API_URL)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.default_api_url.clone());

        Ok(Config {
            api_key,
            api_url,
            auto_capture: bool_value(&doc, KEY_AUTO_CAPTURE).unwrap_or(false),
            show_notifications: bool_value(&doc, KEY_SHOW_NOTIFICATIONS).unwrap_or(true),
        })
    }

    /// Write only the keys present in `update`.
    pub async fn set(&self, update: ConfigUpdate) -> Result<(), StoreError> {
        let entries = match serde_json::to_value(&update)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        if entries.is_empty() {
            return Ok(());
        }

        debug!(
            "Updating config keys: {}",
            entries.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        self.store.set(entries).await
    }
}

fn string_value(doc: &Document, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_value(doc: &Document, key: &str) -> Option<bool> {
    doc.get(key).and_then(Value::as_bool)
}
