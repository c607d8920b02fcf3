//! Byte carriers between host and client.
//!
//! All variants share the [`Transport`] contract so the layers above (the
//! encrypted [`PacketChannel`](crate::channel::PacketChannel), heartbeats,
//! the packet listener) never care which one they are holding:
//!
//! - [`StreamTransport`] – TCP with a 4-byte little-endian length prefix per
//!   message. Ordered and reliable; used for keys, heartbeats, mode switches.
//! - [`DatagramTransport`] – one UDP datagram per message. Lossy but never
//!   delayed by retransmission; used for mouse traffic.
//! - [`MemoryTransport`] – an in-process pair for exercising the layers above
//!   without sockets.
//!
//! `receive` suspends until a whole message is available. Callers that need
//! to stop waiting race it against a cancellation token in `tokio::select!`.

pub mod datagram;
pub mod memory;
pub mod stream;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use datagram::DatagramTransport;
pub use memory::MemoryTransport;
pub use stream::StreamTransport;

/// Largest message a transport accepts, in bytes.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Errors raised by any transport variant.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection, or it was closed locally.
    #[error("connection closed")]
    Closed,

    /// A frame header announced more bytes than [`MAX_MESSAGE_LEN`].
    #[error("frame of {0} bytes exceeds the {MAX_MESSAGE_LEN}-byte limit")]
    FrameTooLarge(usize),

    /// A send-only operation was attempted on a transport with no remote.
    #[error("transport has no remote address to send to")]
    NoRemote,

    /// A send did not complete in time and was abandoned. On a stream the
    /// frame may be half written, so the transport is no longer usable.
    #[error("send stalled for {0:?}")]
    Stalled(Duration),

    /// The underlying socket failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform send/receive/liveness contract over the stream and datagram carriers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one whole message.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Waits for the next whole message.
    async fn receive(&self) -> Result<Vec<u8>, TransportError>;

    /// `false` once the transport has failed or been closed. Datagram
    /// transports always report `true`.
    fn is_connected(&self) -> bool;
}

/// Transport whose sends and receives never complete, like a peer that
/// stopped reading without closing its socket.
#[cfg(test)]
pub(crate) struct StalledTransport;

#[cfg(test)]
#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _payload: &[u8]) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        true
    }
}
