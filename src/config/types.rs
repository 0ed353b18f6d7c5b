//! Configuration Types

use serde::{Deserialize, Serialize};

use super::storage::ConfigError;
use crate::bridge::{BatchPolicy, BridgeConfig};
use crate::session::ReaperPolicy;
use crate::ssh::SshSettings;

/// Current config file version
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable that overrides `encryption_key`
pub const ENCRYPTION_KEY_ENV: &str = "TERMGATE_ENCRYPTION_KEY";

/// Gateway configuration file
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub batching: BatchPolicy,

    #[serde(default)]
    pub reaper: ReaperPolicy,

    /// Passphrase the credential cipher key is derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            bridge: BridgeConfig::default(),
            ssh: SshSettings::default(),
            batching: BatchPolicy::default(),
            reaper: ReaperPolicy::default(),
            encryption_key: None,
        }
    }
}

impl GatewayConfig {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENCRYPTION_KEY_ENV).filter(|k| !k.is_empty()) {
            tracing::debug!("Encryption key taken from {}", ENCRYPTION_KEY_ENV);
            self.encryption_key = Some(key);
        }
    }

    /// Configured key material; a gateway cannot start without it
    pub fn encryption_key(&self) -> Result<&str, ConfigError> {
        self.encryption_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingEncryptionKey)
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("version", &self.version)
            .field("bridge", &self.bridge)
            .field("ssh", &self.ssh)
            .field("batching", &self.batching)
            .field("reaper", &self.reaper)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
