//! Credential types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::error::ResolveError;

/// Authentication mode of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Password,
    Key,
}

/// A credential record as kept by the asset registry.
///
/// Secret fields hold the encrypted text form produced by
/// [`SecretCipher::encrypt`](crate::crypto::SecretCipher::encrypt).
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: Uuid,
    pub username: String,
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("auth_mode", &self.auth_mode)
            .field("has_password", &self.password.is_some())
            .field("has_private_key", &self.private_key.is_some())
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}

/// Read access to stored credential records.
///
/// Implemented by the surrounding application; the gateway never writes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a credential by id. `Ok(None)` when it does not exist.
    async fn fetch(&self, id: Uuid) -> Result<Option<StoredCredential>, ResolveError>;
}

/// Credential part of a session creation request
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialRequest {
    /// Stored credential reference; takes precedence over inline fields
    #[serde(default)]
    pub credential_id: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialRequest {
    pub fn stored(credential_id: Uuid) -> Self {
        Self {
            credential_id: Some(credential_id),
            ..Default::default()
        }
    }

    pub fn inline(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credential_id: None,
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

impl std::fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("credential_id", &self.credential_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Decrypted secret material for one handshake
pub enum ResolvedAuth {
    Password(Zeroizing<String>),
    Key {
        private_key: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    },
}

/// Normalized credential, consumed by the connector.
///
/// Deliberately not `Clone`: it is moved into the handshake and dropped
/// (zeroizing its secrets) when the handshake returns.
pub struct ResolvedCredential {
    pub username: String,
    pub auth: ResolvedAuth,
}

impl ResolvedCredential {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: ResolvedAuth::Password(Zeroizing::new(password.into())),
        }
    }

    pub fn key(
        username: impl Into<String>,
        private_key: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            auth: ResolvedAuth::Key {
                private_key: Zeroizing::new(private_key.into()),
                passphrase: passphrase.map(Zeroizing::new),
            },
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        match self.auth {
            ResolvedAuth::Password(_) => AuthMode::Password,
            ResolvedAuth::Key { .. } => AuthMode::Key,
        }
    }
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("username", &self.username)
            .field("auth_mode", &self.auth_mode())
            .finish_non_exhaustive()
    }
}
