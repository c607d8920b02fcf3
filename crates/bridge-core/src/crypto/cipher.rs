//! Per-session authenticated cipher.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::crypto::{keys::SessionKey, CryptoError, ENVELOPE_OVERHEAD, NONCE_SIZE};

/// AES-256-GCM cipher bound to one session key.
///
/// The expanded key schedule lives inside `Aes256Gcm`, which is built with
/// the `zeroize` feature and wipes it when the cipher is dropped.
pub struct SessionCipher {
    aead: Aes256Gcm,
}

impl SessionCipher {
    pub fn new(key: &SessionKey) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Builds a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless `key` is 32 bytes.
    pub fn from_slice(key: &[u8]) -> Result<Self, CryptoError> {
        let aead = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: super::KEY_SIZE,
            actual: key.len(),
        })?;
        Ok(Self { aead })
    }

    /// Seals `plaintext` into `nonce ‖ ciphertext ‖ tag` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if the AEAD rejects the input
    /// (only possible for plaintexts far larger than any packet).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self
            .aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }

    /// Opens an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::AuthenticationFailure`] if the payload is
    /// shorter than 28 bytes or the tag does not verify.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if payload.len() < ENVELOPE_OVERHEAD {
            return Err(CryptoError::AuthenticationFailure);
        }
        let (nonce, sealed) = payload.split_at(NONCE_SIZE);
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCipher(..)")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
