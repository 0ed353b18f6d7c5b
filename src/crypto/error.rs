//! Error types for secret encryption/decryption

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption key is not configured")]
    MissingKey,

    #[error("Invalid encrypted data format: {0}")]
    Malformed(String),

    #[error("Ciphertext too short ({0} bytes)")]
    TooShort(usize),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed (wrong key or tampered data)")]
    DecryptionFailed,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}
