//! Credential secret encryption
//!
//! Secrets stored on credential records (passwords, private keys, key
//! passphrases) are sealed with AES-256-GCM under one process-wide key.

mod cipher;
mod error;

pub(crate) use cipher::has_key_block_markers;
pub use cipher::{SecretCipher, KEY_LEN, NONCE_LEN};
pub use error::CipherError;
