//! Credential resolution
//!
//! Turns a connect request (stored credential reference or inline
//! username/password) into a [`ResolvedCredential`] ready for the SSH
//! handshake. Stored secrets are decrypted with the process-wide
//! [`SecretCipher`](crate::crypto::SecretCipher) and key material is sanity
//! checked before any connection attempt.

mod error;
mod resolver;
mod types;

pub use error::{ResolveError, SecretField};
pub use resolver::{validate_private_key, CredentialResolver, MIN_PRIVATE_KEY_LEN};
pub use types::{
    AuthMode, CredentialRequest, CredentialStore, ResolvedAuth, ResolvedCredential,
    StoredCredential,
};
