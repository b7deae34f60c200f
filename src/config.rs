use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StoreError};

pub const DEFAULT_CONFIG_FILE: &str = "kakaki.toml";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Credentials and region for one store instance.
///
/// JSON files use the `{ "accessKeyId", "secretAccessKey", "region" }`
/// shape; TOML files may use either camelCase or snake_case keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(alias = "access_key_id")]
    pub access_key_id: String,
    #[serde(alias = "secret_access_key")]
    pub secret_access_key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO and friends).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, alias = "force_path_style")]
    pub force_path_style: bool,
    /// Bucket used by the CLI when `--bucket` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            force_path_style: false,
            bucket: None,
        }
    }
}

impl StoreConfig {
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };

        tracing::debug!(path = %path.display(), region = %config.region, "Loaded store configuration");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(content)
            .map_err(|e| StoreError::Config(format!("malformed JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| StoreError::Config(format!("malformed TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("accessKeyId", &self.access_key_id),
            ("secretAccessKey", &self.secret_access_key),
            ("region", &self.region),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::Config(format!("{} must not be empty", name)));
            }
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(StoreError::Config(format!(
                    "endpoint must be an http(s) URL, got {}",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Writes the configuration as TOML, e.g. to seed a template file.
    pub fn save(&self, config_path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}
