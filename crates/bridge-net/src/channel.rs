//! Encrypted packet I/O on top of a [`Transport`].
//!
//! A [`PacketChannel`] pairs one transport with the session cipher: `send`
//! encodes, seals, and transmits; `recv` receives, opens, and decodes. Any
//! failure in that pipeline is a [`LinkError`]; the receive loops above treat
//! every variant as fatal for the current connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{decode_packet, encode_packet, CryptoError, InputPacket, PacketError, SessionCipher};
use thiserror::Error;

use crate::transport::{Transport, TransportError};

/// Failure anywhere between a packet and the wire.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("envelope rejected: {0}")]
    Crypto(#[from] CryptoError),

    #[error("packet rejected: {0}")]
    Packet(#[from] PacketError),
}

/// A transport plus the cipher of the session it belongs to.
#[derive(Clone)]
pub struct PacketChannel {
    transport: Arc<dyn Transport>,
    cipher: Arc<SessionCipher>,
}

impl PacketChannel {
    pub fn new(transport: Arc<dyn Transport>, cipher: Arc<SessionCipher>) -> Self {
        Self { transport, cipher }
    }

    /// Seals `packet` under a fresh nonce and sends it as one message.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Crypto`] if sealing fails or
    /// [`LinkError::Transport`] if the transport rejects the message.
    pub async fn send(&self, packet: &InputPacket) -> Result<(), LinkError> {
        let envelope = self.cipher.encrypt(&encode_packet(packet))?;
        self.transport.send(&envelope).await?;
        Ok(())
    }

    /// [`send`](Self::send) bounded by `limit`. A send still pending after
    /// `limit` is abandoned and reported as [`TransportError::Stalled`].
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus the stall.
    pub async fn send_within(&self, packet: &InputPacket, limit: Duration) -> Result<(), LinkError> {
        match tokio::time::timeout(limit, self.send(packet)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Stalled(limit).into()),
        }
    }

    /// Waits for the next message and opens it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Transport`] on transport failure,
    /// [`LinkError::Crypto`] if the envelope does not authenticate, and
    /// [`LinkError::Packet`] if the plaintext is not a valid packet.
    pub async fn recv(&self) -> Result<InputPacket, LinkError> {
        let envelope = self.transport.receive().await?;
        let plaintext = self.cipher.decrypt(&envelope)?;
        Ok(decode_packet(&plaintext)?)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

/// The view of a live connection that the host's input router sends through.
///
/// Implemented by [`Generation`](crate::session::Generation); tests supply
/// recording doubles.
#[async_trait]
pub trait RemoteLink: Send + Sync {
    /// `true` while the reliable stream is up.
    fn is_live(&self) -> bool;

    /// Sends over the ordered stream (keys, mode switches).
    async fn send_reliable(&self, packet: &InputPacket) -> Result<(), LinkError>;

    /// Sends over the lossy datagram path (mouse traffic).
    async fn send_datagram(&self, packet: &InputPacket) -> Result<(), LinkError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
