//! SSH Client implementation using russh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::client::{self, Handle, Msg};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{PrivateKey, PublicKey, PublicKeyBase64};
use russh::{Channel, Disconnect, Pty};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::config::{ConnectTarget, HostKeyPolicy, SshSettings, TerminalGeometry};
use super::error::SshError;
use super::session::{spawn_shell_task, RemoteShell};
use crate::credential::{ResolvedAuth, ResolvedCredential};

/// Terminal type announced in the PTY request
const TERM_TYPE: &str = "xterm-256color";
/// Line speed reported in the PTY modes
const TTY_SPEED: u32 = 14400;
/// Environment set before the shell starts
const SHELL_ENV: [(&str, &str); 4] = [
    ("TERM", TERM_TYPE),
    ("COLORTERM", "truecolor"),
    ("LANG", "en_US.UTF-8"),
    ("LC_ALL", "en_US.UTF-8"),
];

/// Opens interactive shells on remote hosts
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Dial `target`, authenticate with `credential` and start a shell on a
    /// PTY of `geometry`. The credential is consumed by the handshake.
    async fn open_shell(
        &self,
        target: &ConnectTarget,
        credential: ResolvedCredential,
        geometry: TerminalGeometry,
    ) -> Result<RemoteShell, SshError>;
}

/// Authentication prepared from a resolved credential
enum PreparedAuth {
    Password(String),
    PublicKey(Arc<PrivateKey>),
}

/// Production connector backed by russh
pub struct RusshConnector {
    settings: SshSettings,
}

impl RusshConnector {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Step 1: build the authentication method, parsing key material
    fn prepare_auth(credential: &ResolvedCredential) -> Result<PreparedAuth, SshError> {
        match &credential.auth {
            ResolvedAuth::Password(password) => Ok(PreparedAuth::Password(password.to_string())),
            ResolvedAuth::Key {
                private_key,
                passphrase,
            } => {
                let key = russh::keys::decode_secret_key(
                    private_key,
                    passphrase.as_ref().map(|p| p.as_str()),
                )
                .map_err(|e| {
                    SshError::KeyError(format!(
                        "{} (key length: {} characters)",
                        e,
                        private_key.chars().count()
                    ))
                })?;
                Ok(PreparedAuth::PublicKey(Arc::new(key)))
            }
        }
    }

    /// Step 2: dial with a bounded timeout
    async fn dial(&self, target: &ConnectTarget) -> Result<Handle<ClientHandler>, SshError> {
        let keepalive_interval = (self.settings.keepalive_interval_secs > 0)
            .then(|| Duration::from_secs(self.settings.keepalive_interval_secs));
        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval,
            keepalive_max: self.settings.keepalive_max,
            ..Default::default()
        };

        let handler = ClientHandler::new(target.to_string(), self.settings.host_key_policy.clone());
        let timeout_secs = self.settings.connect_timeout_secs;

        tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            client::connect(
                Arc::new(ssh_config),
                (target.host.as_str(), target.port),
                handler,
            ),
        )
        .await
        .map_err(|_| SshError::Timeout(timeout_secs))?
        .map_err(|e| match e {
            rejected @ SshError::HostKeyRejected(_) => rejected,
            other => SshError::ConnectionFailed(other.to_string()),
        })
    }

    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        username: &str,
        auth: PreparedAuth,
    ) -> Result<(), SshError> {
        let result = match auth {
            PreparedAuth::Password(password) => handle
                .authenticate_password(username, password)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
            PreparedAuth::PublicKey(key) => handle
                .authenticate_publickey(username, PrivateKeyWithHashAlg::new(key, None))
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
        };

        if !result.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }
        Ok(())
    }

    /// Steps 4-6: PTY, environment, shell
    async fn start_shell(
        channel: &Channel<Msg>,
        geometry: TerminalGeometry,
    ) -> Result<(), SshError> {
        let modes = [
            (Pty::ECHO, 1),
            (Pty::TTY_OP_ISPEED, TTY_SPEED),
            (Pty::TTY_OP_OSPEED, TTY_SPEED),
        ];

        channel
            .request_pty(true, TERM_TYPE, geometry.cols, geometry.rows, 0, 0, &modes)
            .await
            .map_err(|e| SshError::PtyRequestFailed(e.to_string()))?;

        // Most servers only honour AcceptEnv-listed variables
        for (name, value) in SHELL_ENV {
            if let Err(e) = channel.set_env(false, name, value).await {
                debug!("set_env {} refused: {}", name, e);
            }
        }

        channel
            .request_shell(true)
            .await
            .map_err(|e| SshError::ShellStartFailed(e.to_string()))
    }
}

async fn disconnect(handle: &Handle<ClientHandler>, reason: &str) {
    let _ = handle
        .disconnect(Disconnect::ByApplication, reason, "en")
        .await;
}

#[async_trait]
impl ShellConnector for RusshConnector {
    async fn open_shell(
        &self,
        target: &ConnectTarget,
        credential: ResolvedCredential,
        geometry: TerminalGeometry,
    ) -> Result<RemoteShell, SshError> {
        let auth = Self::prepare_auth(&credential)?;

        info!("Connecting to SSH server at {}", target);
        let mut handle = self.dial(target).await?;
        debug!("SSH handshake completed with {}", target);

        if let Err(e) = Self::authenticate(&mut handle, &credential.username, auth).await {
            disconnect(&handle, "Authentication failed").await;
            return Err(e);
        }
        drop(credential);
        info!("SSH authentication successful for {}", target);

        let channel = match handle.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                disconnect(&handle, "Session open failed").await;
                return Err(SshError::SessionOpenFailed(e.to_string()));
            }
        };

        if let Err(e) = Self::start_shell(&channel, geometry).await {
            let _ = channel.close().await;
            disconnect(&handle, "Shell setup failed").await;
            return Err(e);
        }

        info!(
            "Interactive shell started on {} ({}x{})",
            target, geometry.cols, geometry.rows
        );
        Ok(spawn_shell_task(handle, channel, target.to_string()))
    }
}

/// SHA256 fingerprint in OpenSSH notation (`SHA256:<base64 without padding>`)
pub fn host_key_fingerprint(key: &PublicKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.public_key_bytes());
    let hash = hasher.finalize();
    format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
}

/// Client handler for russh callbacks
pub struct ClientHandler {
    /// Target for log messages
    target: String,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(target: String, policy: HostKeyPolicy) -> Self {
        Self { target, policy }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = host_key_fingerprint(server_public_key);

        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                debug!(
                    "Host key verification disabled, accepting {} for {}",
                    fingerprint, self.target
                );
                Ok(true)
            }
            policy if policy.permits(&fingerprint) => {
                info!("Host key verified for {} ({})", self.target, fingerprint);
                Ok(true)
            }
            _ => {
                warn!(
                    "Host key {} for {} is not in the allowed list, rejecting",
                    fingerprint, self.target
                );
                Err(SshError::HostKeyRejected(format!(
                    "{} presented unknown key {}",
                    self.target, fingerprint
                )))
            }
        }
    }
}
