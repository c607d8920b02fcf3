//! Cryptographic primitives for the input bridge.
//!
//! - [`cipher`] – the per-session AES-256-GCM envelope used for every packet.
//! - [`keys`] – secret and key types that wipe themselves on drop, plus the
//!   challenge/response and key-wrapping helpers used by the handshake.
//!
//! # Envelope layout
//!
//! ```text
//! [nonce:12][ciphertext:N][tag:16]
//! ```
//!
//! A fresh random nonce is generated for every envelope. Sessions never
//! reuse a key across connections, so nonce collisions are bounded to the
//! birthday bound of one session's traffic.

pub mod cipher;
pub mod keys;

use thiserror::Error;

pub use cipher::SessionCipher;
pub use keys::{
    challenge_response, derive_wrapping_key, random_challenge, unwrap_session_key,
    verify_challenge_response, wrap_session_key, SessionKey, SharedSecret,
};

/// Size of every symmetric key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes an envelope adds on top of its plaintext.
pub const ENVELOPE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Size of the handshake challenge in bytes.
pub const CHALLENGE_SIZE: usize = 32;

/// Size of an HMAC-SHA256 challenge response in bytes.
pub const RESPONSE_SIZE: usize = 32;

/// Size of a wrapped session key: nonce, tag, then the encrypted key.
pub const WRAPPED_KEY_SIZE: usize = NONCE_SIZE + TAG_SIZE + KEY_SIZE;

/// Errors produced by the cryptographic layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The payload was too short, tampered with, or sealed under another key.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Key material had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The AEAD implementation refused to seal the plaintext.
    #[error("encryption failed")]
    EncryptionFailed,
}
