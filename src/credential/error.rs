//! Credential resolution errors
//!
//! Every variant renders a message specific enough to show to the operator
//! who requested the terminal.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CipherError;

/// Which stored secret failed to decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretField {
    Password,
    PrivateKey,
    Passphrase,
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretField::Password => f.write_str("password"),
            SecretField::PrivateKey => f.write_str("private key"),
            SecretField::Passphrase => f.write_str("key passphrase"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Username is required")]
    MissingUsername,

    #[error("Password is required")]
    MissingPassword,

    #[error("Credential {0} does not exist or is not accessible")]
    CredentialNotFound(Uuid),

    #[error("Credential store unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Credential has no private key, set the private key again")]
    MissingPrivateKey,

    #[error("Decrypted private key is empty")]
    EmptyPrivateKey,

    #[error("Private key is too short ({0} characters), it may be corrupted")]
    KeyTooShort(usize),

    #[error("Private key is malformed: missing BEGIN/END markers")]
    KeyMarkersMissing,

    #[error("Failed to decrypt {field}: {source}")]
    Decrypt {
        field: SecretField,
        #[source]
        source: CipherError,
    },
}
