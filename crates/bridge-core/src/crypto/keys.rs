//! Key material and the primitives the handshake is built from.
//!
//! Nothing in this module ever formats a secret or key into a string: the
//! `Debug` impls are redacted and both types zero their bytes on drop.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Key, Nonce, Tag,
};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{
    CryptoError, CHALLENGE_SIZE, KEY_SIZE, NONCE_SIZE, RESPONSE_SIZE, TAG_SIZE, WRAPPED_KEY_SIZE,
};

type HmacSha256 = Hmac<Sha256>;

/// The human-provisioned secret both peers know in advance.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// A 256-bit symmetric key negotiated for one connection.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Draws a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Returns a fresh random handshake challenge.
pub fn random_challenge() -> [u8; CHALLENGE_SIZE] {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

/// HMAC-SHA256 over `challenge`, keyed with the secret's UTF-8 bytes.
pub fn challenge_response(secret: &SharedSecret, challenge: &[u8]) -> [u8; RESPONSE_SIZE] {
    keyed_mac(secret, challenge).finalize().into_bytes().into()
}

/// Checks a peer's challenge response in constant time.
pub fn verify_challenge_response(secret: &SharedSecret, challenge: &[u8], response: &[u8]) -> bool {
    keyed_mac(secret, challenge).verify_slice(response).is_ok()
}

/// SHA-256 of the secret; used to wrap session keys so the raw secret never
/// becomes an encryption key.
pub fn derive_wrapping_key(secret: &SharedSecret) -> Zeroizing<[u8; KEY_SIZE]> {
    Zeroizing::new(Sha256::digest(secret.as_bytes()).into())
}

/// Encrypts `key` under the secret-derived wrapping key.
///
/// Layout: `nonce(12) ‖ tag(16) ‖ ciphertext(32)`.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if sealing fails.
pub fn wrap_session_key(
    key: &SessionKey,
    secret: &SharedSecret,
) -> Result<[u8; WRAPPED_KEY_SIZE], CryptoError> {
    let aead = wrapping_cipher(secret);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut body = Zeroizing::new(*key.as_bytes());
    let tag = aead
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", body.as_mut_slice())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut package = [0u8; WRAPPED_KEY_SIZE];
    package[..NONCE_SIZE].copy_from_slice(&nonce);
    package[NONCE_SIZE..NONCE_SIZE + TAG_SIZE].copy_from_slice(&tag);
    package[NONCE_SIZE + TAG_SIZE..].copy_from_slice(body.as_slice());
    Ok(package)
}

/// Reverses [`wrap_session_key`].
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailure`] if the package is not 60
/// bytes or was wrapped under a different secret.
pub fn unwrap_session_key(package: &[u8], secret: &SharedSecret) -> Result<SessionKey, CryptoError> {
    if package.len() != WRAPPED_KEY_SIZE {
        return Err(CryptoError::AuthenticationFailure);
    }
    let (nonce, rest) = package.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let mut body = Zeroizing::new([0u8; KEY_SIZE]);
    body.copy_from_slice(ciphertext);
    wrapping_cipher(secret)
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            body.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(SessionKey::from_bytes(*body))
}

fn keyed_mac(secret: &SharedSecret, message: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(message);
    mac
}

fn wrapping_cipher(secret: &SharedSecret) -> Aes256Gcm {
    let key = derive_wrapping_key(secret);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
