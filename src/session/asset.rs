//! Asset lookup
//!
//! Assets live in the registry database, outside this crate. The gateway
//! only needs where to dial.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ssh::ConnectTarget;

/// Fallback host for assets registered without an address
pub const DEFAULT_HOST: &str = "localhost";
/// Fallback SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset lookup failed: {0}")]
    Unavailable(String),
}

/// Network address of an asset as registered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEndpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl AssetEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Dial target, with empty host and port 0 replaced by defaults
    pub fn target(&self) -> ConnectTarget {
        let host = match self.host.trim() {
            "" => DEFAULT_HOST,
            h => h,
        };
        let port = if self.port == 0 { DEFAULT_SSH_PORT } else { self.port };
        ConnectTarget::new(host, port)
    }
}

/// Resolves asset ids to endpoints
#[async_trait]
pub trait AssetDirectory: Send + Sync {
    async fn lookup(&self, asset_id: &str) -> Result<AssetEndpoint, AssetError>;
}

/// Fixed in-memory directory
#[derive(Debug, Default, Clone)]
pub struct StaticAssetDirectory {
    assets: HashMap<String, AssetEndpoint>,
}

impl StaticAssetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, asset_id: impl Into<String>, endpoint: AssetEndpoint) -> Self {
        self.assets.insert(asset_id.into(), endpoint);
        self
    }
}

#[async_trait]
impl AssetDirectory for StaticAssetDirectory {
    async fn lookup(&self, asset_id: &str) -> Result<AssetEndpoint, AssetError> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(asset_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        assert_eq!(
            AssetEndpoint::default().target(),
            ConnectTarget::new("localhost", 22)
        );
        assert_eq!(
            AssetEndpoint::new("  ", 2222).target(),
            ConnectTarget::new("localhost", 2222)
        );
        assert_eq!(
            AssetEndpoint::new("10.1.2.3", 0).target(),
            ConnectTarget::new("10.1.2.3", 22)
        );
    }

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory =
            StaticAssetDirectory::new().with_asset("web-01", AssetEndpoint::new("web01.lan", 22));

        assert_eq!(directory.lookup("web-01").await.unwrap().host, "web01.lan");
        assert!(matches!(
            directory.lookup("ghost").await,
            Err(AssetError::NotFound(id)) if id == "ghost"
        ));
    }
}
