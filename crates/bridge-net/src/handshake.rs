//! Challenge/response authentication and session-key delivery.
//!
//! Runs once on every new stream, before any packet is framed. The messages
//! are single-line JSON objects terminated by `\n`:
//!
//! ```text
//! host   → client  {"Challenge":"<32 bytes, base64>"}
//! client → host    {"HmacResponse":"<32 bytes, base64>","Hostname":"..","Version":".."}
//! host   → client  {"EncryptedAesKey":"<60 bytes, base64>"}
//! ```
//!
//! # Why this shape? (for beginners)
//!
//! - The client proves it knows the shared secret by returning
//!   HMAC-SHA256(secret, challenge). The challenge is random, so a recorded
//!   response is useless against the next connection, and the secret itself
//!   never crosses the wire.
//! - The host then picks a brand-new random session key and sends it
//!   encrypted under SHA-256(secret). Only a peer with the secret can unwrap
//!   it, and every connection gets a different key.
//!
//! Both roles return `Option<SessionInfo>`: `None` for every failure
//! (mismatched secret, malformed line, peer hung up), so the connection loop
//! handles all of them the same way. The reason is logged, never the secret.
//!
//! Lines are read one byte at a time rather than through a `BufReader`, so
//! no bytes belonging to the first framed packet are swallowed into a buffer
//! that is dropped when the handshake returns.

use base64::{engine::general_purpose::STANDARD, Engine};
use bridge_core::crypto::{
    challenge_response, random_challenge, unwrap_session_key, verify_challenge_response,
    wrap_session_key, CryptoError, CHALLENGE_SIZE,
};
use bridge_core::{SessionKey, SharedSecret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Version string exchanged during the handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest handshake line accepted, in bytes.
pub const MAX_LINE_LEN: usize = 4096;

/// Which side of the exchange this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// Issues the challenge and generates the session key.
    Host,
    /// Answers the challenge and receives the session key.
    Client,
}

/// Reasons a handshake did not produce a session. Only ever logged.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the stream mid-handshake")]
    PeerClosed,

    #[error("handshake line exceeds {MAX_LINE_LEN} bytes")]
    LineTooLong,

    #[error("malformed handshake message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid base64 in handshake message: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("challenge has {0} bytes, expected {CHALLENGE_SIZE}")]
    BadChallengeLength(usize),

    #[error("peer failed authentication")]
    AuthenticationFailed,

    #[error("key wrapping failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Name and version this process presents to its peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub hostname: String,
    pub version: String,
}

impl LocalIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Identity built from the machine's hostname.
    pub fn from_environment() -> Self {
        Self::new(local_hostname())
    }
}

/// Returns the machine name from `COMPUTERNAME` (Windows) or `HOSTNAME`
/// (most Unix shells), falling back to `"unknown-host"`.
pub fn local_hostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Result of a successful handshake. The key is wiped when this is dropped.
#[derive(Debug)]
pub struct SessionInfo {
    pub session_key: SessionKey,
    pub peer_hostname: String,
    pub peer_version: String,
}

// ── Wire messages ─────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ChallengeMessage {
    #[serde(rename = "Challenge", with = "base64_bytes")]
    challenge: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct ResponseMessage {
    #[serde(rename = "HmacResponse", with = "base64_bytes")]
    hmac_response: Vec<u8>,
    #[serde(rename = "Hostname")]
    hostname: String,
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Serialize, Deserialize)]
struct KeyDeliveryMessage {
    #[serde(rename = "EncryptedAesKey", with = "base64_bytes")]
    encrypted_key: Vec<u8>,
}

mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// One handshake attempt's inputs.
pub struct Handshake<'a> {
    secret: &'a SharedSecret,
    identity: &'a LocalIdentity,
}

impl<'a> Handshake<'a> {
    pub fn new(secret: &'a SharedSecret, identity: &'a LocalIdentity) -> Self {
        Self { secret, identity }
    }

    /// Runs the given role. `peer_name` is recorded as the peer's hostname on
    /// the client side, where the host does not announce one in-band.
    pub async fn perform<S>(
        &self,
        role: HandshakeRole,
        stream: &mut S,
        peer_name: Option<&str>,
    ) -> Option<SessionInfo>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match role {
            HandshakeRole::Host => self.as_host(stream).await,
            HandshakeRole::Client => self.as_client(stream, peer_name.unwrap_or("host")).await,
        }
    }

    /// Challenges the peer and, if it answers correctly, issues a session key.
    pub async fn as_host<S>(&self, stream: &mut S) -> Option<SessionInfo>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self.run_host(stream).await {
            Ok(session) => {
                info!(peer = %session.peer_hostname, version = %session.peer_version, "handshake complete");
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "handshake rejected");
                None
            }
        }
    }

    /// Answers the host's challenge and unwraps the session key it sends.
    pub async fn as_client<S>(&self, stream: &mut S, host_name: &str) -> Option<SessionInfo>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self.run_client(stream, host_name).await {
            Ok(session) => {
                info!(peer = %session.peer_hostname, "handshake complete");
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "handshake failed");
                None
            }
        }
    }

    async fn run_host<S>(&self, stream: &mut S) -> Result<SessionInfo, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let challenge = random_challenge();
        write_line(
            stream,
            &ChallengeMessage {
                challenge: challenge.to_vec(),
            },
        )
        .await?;

        let response: ResponseMessage = read_line(stream).await?;
        if !verify_challenge_response(self.secret, &challenge, &response.hmac_response) {
            return Err(HandshakeError::AuthenticationFailed);
        }
        debug!(peer = %response.hostname, "challenge response verified");

        let session_key = SessionKey::generate();
        let package = wrap_session_key(&session_key, self.secret)?;
        write_line(
            stream,
            &KeyDeliveryMessage {
                encrypted_key: package.to_vec(),
            },
        )
        .await?;

        Ok(SessionInfo {
            session_key,
            peer_hostname: response.hostname,
            peer_version: response.version,
        })
    }

    async fn run_client<S>(&self, stream: &mut S, host_name: &str) -> Result<SessionInfo, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let challenge: ChallengeMessage = read_line(stream).await?;
        if challenge.challenge.len() != CHALLENGE_SIZE {
            return Err(HandshakeError::BadChallengeLength(challenge.challenge.len()));
        }

        let response = challenge_response(self.secret, &challenge.challenge);
        write_line(
            stream,
            &ResponseMessage {
                hmac_response: response.to_vec(),
                hostname: self.identity.hostname.clone(),
                version: self.identity.version.clone(),
            },
        )
        .await?;

        let delivery: KeyDeliveryMessage = read_line(stream).await?;
        let session_key = unwrap_session_key(&delivery.encrypted_key, self.secret)
            .map_err(|_| HandshakeError::AuthenticationFailed)?;

        Ok(SessionInfo {
            session_key,
            peer_hostname: host_name.to_string(),
            peer_version: PROTOCOL_VERSION.to_string(),
        })
    }
}

// ── Line I/O ──────────────────────────────────────────────────────────────────

async fn write_line<S, T>(stream: &mut S, message: &T) -> Result<(), HandshakeError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_line<S, T>(stream: &mut S) -> Result<T, HandshakeError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    loop {
        if stream.read(&mut byte).await? == 0 {
            return Err(HandshakeError::PeerClosed);
        }
        match byte[0] {
            b'\n' => break,
            b => {
                if line.len() == MAX_LINE_LEN {
                    return Err(HandshakeError::LineTooLong);
                }
                line.push(b);
            }
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(serde_json::from_slice(&line)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
