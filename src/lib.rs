//! termgate - browser-to-SSH terminal gateway
//!
//! Opens interactive shells on registered assets and proxies them to browser
//! terminals over WebSocket. The host application supplies asset lookup,
//! stored credentials and an audit sink; the gateway owns everything from
//! credential decryption to session teardown.

pub mod bridge;
pub mod config;
pub mod credential;
pub mod crypto;
mod error;
pub mod session;
pub mod ssh;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use bridge::{BatchPolicy, BridgeConfig, BridgeServer};
pub use config::{ConfigError, ConfigStorage, GatewayConfig};
pub use credential::{CredentialRequest, CredentialResolver, CredentialStore, StoredCredential};
pub use crypto::SecretCipher;
pub use error::GatewayError;
pub use session::{
    AssetDirectory, AuditSink, Clock, CloseReason, CreateSessionRequest, ReaperHandle,
    SessionInfo, SessionReaper, SessionRegistry, SystemClock, TracingAuditSink,
};
pub use ssh::{RusshConnector, ShellConnector};

/// Install the default tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Does nothing if a
/// global subscriber is already set.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Running gateway: registry, WebSocket bridge and reaper
pub struct Gateway {
    registry: Arc<SessionRegistry>,
    bridge: BridgeServer,
    reaper: ReaperHandle,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Address the WebSocket bridge is bound to
    pub fn bridge_addr(&self) -> SocketAddr {
        self.bridge.local_addr()
    }

    /// Open a session; clients then connect to the bridge with the id
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<String, GatewayError> {
        self.registry.create(request).await
    }

    pub async fn resize(&self, session_id: &str, cols: u32, rows: u32) -> Result<(), GatewayError> {
        self.registry.resize(session_id, cols, rows).await
    }

    pub fn close(&self, session_id: &str) -> Result<(), GatewayError> {
        self.registry.close(session_id, CloseReason::Requested)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    /// Stop the reaper and the listener, then close every session
    pub async fn shutdown(self) {
        info!("Gateway shutting down");
        self.reaper.shutdown().await;
        self.bridge.shutdown().await;
        let closed = self.registry.close_all(CloseReason::Shutdown);
        info!("Gateway stopped, {} session(s) closed", closed);
    }
}

/// Wires the gateway to its collaborators
pub struct GatewayBuilder {
    config: GatewayConfig,
    credentials: Option<Arc<dyn CredentialStore>>,
    assets: Option<Arc<dyn AssetDirectory>>,
    audit: Option<Arc<dyn AuditSink>>,
    connector: Option<Arc<dyn ShellConnector>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            credentials: None,
            assets: None,
            audit: None,
            connector: None,
            clock: None,
        }
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn assets(mut self, directory: Arc<dyn AssetDirectory>) -> Self {
        self.assets = Some(directory);
        self
    }

    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Replace the russh connector
    pub fn connector(mut self, connector: Arc<dyn ShellConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the registry, bind the bridge and start the reaper
    pub async fn build(self) -> Result<Gateway, GatewayError> {
        let GatewayBuilder {
            config,
            credentials,
            assets,
            audit,
            connector,
            clock,
        } = self;

        let credentials = credentials.ok_or(ConfigError::MissingCollaborator("credential store"))?;
        let assets = assets.ok_or(ConfigError::MissingCollaborator("asset directory"))?;

        let cipher = Arc::new(SecretCipher::from_passphrase(config.encryption_key()?)?);
        let resolver = CredentialResolver::new(credentials, cipher);
        let connector =
            connector.unwrap_or_else(|| Arc::new(RusshConnector::new(config.ssh.clone())));

        let registry = Arc::new(
            SessionRegistry::new(resolver, assets, connector)
                .with_audit(audit.unwrap_or_else(|| Arc::new(TracingAuditSink)))
                .with_clock(clock.unwrap_or_else(|| Arc::new(SystemClock)))
                .with_batch_policy(config.batching),
        );

        let bridge = BridgeServer::bind(config.bridge.clone(), registry.clone()).await?;
        let reaper = SessionReaper::new(registry.clone(), config.reaper).spawn();

        info!("Gateway started, bridge on {}", bridge.local_addr());

        Ok(Gateway {
            registry,
            bridge,
            reaper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::ResolveError;
    use crate::session::StaticAssetDirectory;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct NoCredentials;

    #[async_trait]
    impl CredentialStore for NoCredentials {
        async fn fetch(&self, _id: Uuid) -> Result<Option<StoredCredential>, ResolveError> {
            Ok(None)
        }
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.bridge.listen_addr = "127.0.0.1:0".to_string();
        config.encryption_key = Some("gateway-tests".to_string());
        config
    }

    #[tokio::test]
    async fn test_build_requires_collaborators() {
        let missing_store = Gateway::builder(config())
            .assets(Arc::new(StaticAssetDirectory::new()))
            .build()
            .await;
        assert!(matches!(
            missing_store,
            Err(GatewayError::Config(ConfigError::MissingCollaborator(_)))
        ));

        let missing_assets = Gateway::builder(config())
            .credentials(Arc::new(NoCredentials))
            .build()
            .await;
        assert!(matches!(
            missing_assets,
            Err(GatewayError::Config(ConfigError::MissingCollaborator(_)))
        ));
    }

    #[tokio::test]
    async fn test_build_requires_encryption_key() {
        let mut config = config();
        config.encryption_key = None;

        let result = Gateway::builder(config)
            .credentials(Arc::new(NoCredentials))
            .assets(Arc::new(StaticAssetDirectory::new()))
            .build()
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::Config(ConfigError::MissingEncryptionKey))
        ));
    }

    #[tokio::test]
    async fn test_build_and_shutdown() {
        let gateway = Gateway::builder(config())
            .credentials(Arc::new(NoCredentials))
            .assets(Arc::new(StaticAssetDirectory::new()))
            .build()
            .await
            .unwrap();

        assert_ne!(gateway.bridge_addr().port(), 0);
        assert!(gateway.sessions().is_empty());
        assert!(gateway.close("missing").unwrap_err().is_not_found());

        gateway.shutdown().await;
    }
}
