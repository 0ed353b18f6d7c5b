//! SSH Error types
//!
//! Handshake errors name the step that failed so the operator sees why a
//! terminal could not be opened.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Invalid private key: {0}")]
    KeyError(String),

    #[error("Connection timed out after {0}s")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Failed to open SSH session: {0}")]
    SessionOpenFailed(String),

    #[error("PTY request failed: {0}")]
    PtyRequestFailed(String),

    #[error("Shell start failed: {0}")]
    ShellStartFailed(String),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Disconnected")]
    Disconnected,
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ProtocolError(err.to_string())
    }
}

impl From<russh::keys::Error> for SshError {
    fn from(err: russh::keys::Error) -> Self {
        SshError::KeyError(err.to_string())
    }
}
