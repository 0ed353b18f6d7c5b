//! Gateway error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::credential::ResolveError;
use crate::crypto::CipherError;
use crate::session::AssetError;
use crate::ssh::SshError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Credential(#[from] ResolveError),

    /// Handshake failed; nothing was registered
    #[error("Connection failed: {0}")]
    Connect(#[source] SshError),

    /// Live session transport failed; the session has been torn down
    #[error("Session transport failed: {0}")]
    Transport(#[source] SshError),

    #[error("Invalid terminal size {cols}x{rows}")]
    InvalidGeometry { cols: u32, rows: u32 },

    #[error("Output already attached for session {0}")]
    OutputAlreadyAttached(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("Bridge listener error: {0}")]
    Listener(#[from] std::io::Error),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::SessionNotFound(_))
    }
}
