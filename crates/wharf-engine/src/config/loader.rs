use super::schema::BridgeSettings;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct SettingsLoader;

impl SettingsLoader {
    /// Load from default locations:
    /// 1. ./wharf.yaml
    /// 2. ~/.wharf/config.yaml
    /// 3. Default settings
    pub async fn load_default() -> Result<BridgeSettings, SettingsError> {
        let local = PathBuf::from("./wharf.yaml");
        if local.exists() {
            return Self::load_from(&local).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".wharf").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(BridgeSettings::default())
    }

    pub async fn load_from(path: &Path) -> Result<BridgeSettings, SettingsError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<BridgeSettings, SettingsError> {
        // An empty file is valid and means "all defaults".
        if content.trim().is_empty() {
            return Ok(BridgeSettings::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
