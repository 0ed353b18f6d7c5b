//! Configuration Storage
//!
//! Handles reading/writing the gateway configuration file.
//! Default location: ~/.termgate/gateway.json

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{GatewayConfig, CONFIG_VERSION};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Encryption key is not configured (set encryption_key or TERMGATE_ENCRYPTION_KEY)")]
    MissingEncryptionKey,

    #[error("Gateway requires a {0} collaborator")]
    MissingCollaborator(&'static str),
}

/// Get the termgate configuration directory (~/.termgate)
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".termgate"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get the default config file path
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("gateway.json"))
}

/// Configuration storage manager
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Create a new storage manager with default path
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            path: config_file()?,
        })
    }

    /// Create storage manager with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load configuration from disk.
    ///
    /// A missing file yields defaults. A file that does not parse is an
    /// error.
    pub async fn load(&self) -> Result<GatewayConfig, ConfigError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {:?}, using defaults", self.path);
                return Ok(GatewayConfig::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: GatewayConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                found: config.version,
                supported: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Load and apply environment overrides
    pub async fn load_with_env(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = self.load().await?;
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(config)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("gateway.json"));

        let config = storage.load().await.unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert!(config.encryption_key.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("nested").join("gateway.json"));

        let mut config = GatewayConfig::default();
        config.bridge.listen_addr = "0.0.0.0:8022".to_string();
        config.reaper.idle_timeout_secs = 900;
        config.encryption_key = Some("k".to_string());

        storage.save(&config).await.unwrap();

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded.bridge.listen_addr, "0.0.0.0:8022");
        assert_eq!(loaded.reaper.idle_timeout_secs, 900);
        assert_eq!(loaded.encryption_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("gateway.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = ConfigStorage::with_path(&path).load().await;
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("gateway.json");
        std::fs::write(&path, r#"{"version": 99}"#).unwrap();

        let result = ConfigStorage::with_path(&path).load().await;
        assert!(matches!(
            result,
            Err(ConfigError::VersionTooNew { found: 99, .. })
        ));
    }
}
