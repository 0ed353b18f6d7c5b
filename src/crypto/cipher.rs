//! AES-256-GCM secret cipher
//!
//! Wire format (text): `base64(nonce[12] || ciphertext || tag[16])`, standard
//! alphabet with padding. This is the format existing credential records use.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use tracing::warn;
use zeroize::Zeroizing;

use super::error::CipherError;

/// AES-256 key length
pub const KEY_LEN: usize = 32;
/// GCM standard nonce length
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length
const TAG_LEN: usize = 16;

/// Stateless secret cipher bound to the process-wide key.
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SecretCipher {
    /// Create a cipher from a raw 256-bit key.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Create a cipher from the configured key passphrase.
    ///
    /// The passphrase bytes are copied into a zeroed 32-byte key; shorter
    /// passphrases leave trailing zero bytes, longer ones are truncated.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CipherError> {
        if passphrase.is_empty() {
            return Err(CipherError::MissingKey);
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        let bytes = passphrase.as_bytes();
        let len = bytes.len().min(KEY_LEN);
        key[..len].copy_from_slice(&bytes[..len]);

        Ok(Self { key })
    }

    /// Encrypt raw bytes with a fresh random nonce.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher =
            Aes256Gcm::new_from_slice(&*self.key).map_err(|_| CipherError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt bytes produced by [`SecretCipher::encrypt_bytes`].
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::TooShort(data.len()));
        }

        let cipher =
            Aes256Gcm::new_from_slice(&*self.key).map_err(|_| CipherError::DecryptionFailed)?;
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CipherError::DecryptionFailed)
    }

    /// Encrypt a secret into its stored text form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let sealed = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a stored secret.
    ///
    /// Records written before encryption was introduced may hold a private
    /// key in clear text; those are passed through by
    /// [`SecretCipher::legacy_plaintext`]. Every other decode or
    /// authentication failure is an error.
    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let data = match BASE64.decode(stored) {
            Ok(data) => data,
            Err(e) => {
                return Self::legacy_plaintext(stored)
                    .ok_or_else(|| CipherError::Malformed(e.to_string()))
            }
        };

        let plaintext = Zeroizing::new(self.decrypt_bytes(&data)?);
        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Pass-through for unencrypted legacy key material.
    ///
    /// Only applies to input that is not base64 and visibly carries a key
    /// block (both `BEGIN` and `END` markers, case-insensitive).
    fn legacy_plaintext(stored: &str) -> Option<String> {
        if has_key_block_markers(stored) {
            warn!("Stored secret is not encrypted, accepting legacy plaintext key material");
            Some(stored.to_string())
        } else {
            None
        }
    }
}

/// Whether `text` contains both an opening and a closing key-block marker.
pub(crate) fn has_key_block_markers(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.contains("BEGIN") && upper.contains("END")
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
