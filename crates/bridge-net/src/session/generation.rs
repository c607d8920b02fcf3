//! One authenticated connection.
//!
//! A [`Generation`] is created after a successful handshake and bundles
//! everything that belongs to that single connection: the stream, the
//! datagram socket, and the cipher built from the negotiated key. When the
//! connection ends the whole generation is dropped; nothing in it is ever
//! reused for the next connection, so a stale key or socket cannot leak
//! across reconnects.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::{InputPacket, SessionCipher};
use tracing::debug;
use uuid::Uuid;

use crate::channel::{LinkError, PacketChannel, RemoteLink};
use crate::handshake::SessionInfo;
use crate::transport::{DatagramTransport, StreamTransport, Transport};

pub struct Generation {
    id: Uuid,
    peer: SocketAddr,
    peer_hostname: String,
    peer_version: String,
    stream: Arc<StreamTransport>,
    reliable: PacketChannel,
    datagram: PacketChannel,
}

impl Generation {
    /// Builds the session cipher from `session` and wraps both transports.
    /// The key inside `session` is wiped when `session` is dropped here.
    pub fn new(session: SessionInfo, stream: StreamTransport, datagram: DatagramTransport) -> Self {
        let cipher = Arc::new(SessionCipher::new(&session.session_key));
        let peer = stream.peer_addr();
        let stream = Arc::new(stream);
        let reliable = PacketChannel::new(stream.clone(), cipher.clone());
        let datagram = PacketChannel::new(Arc::new(datagram), cipher);
        let id = Uuid::new_v4();
        debug!(generation = %id, %peer, "generation created");
        Self {
            id,
            peer,
            peer_hostname: session.peer_hostname.clone(),
            peer_version: session.peer_version.clone(),
            stream,
            reliable,
            datagram,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn peer_hostname(&self) -> &str {
        &self.peer_hostname
    }

    pub fn peer_version(&self) -> &str {
        &self.peer_version
    }

    /// Encrypted channel over the stream transport.
    pub fn reliable(&self) -> &PacketChannel {
        &self.reliable
    }

    /// Encrypted channel over the datagram transport.
    pub fn datagram(&self) -> &PacketChannel {
        &self.datagram
    }

    /// Shuts the stream down; the peer's reader sees end-of-stream.
    pub async fn close(&self) {
        self.stream.close().await;
    }
}

#[async_trait]
impl RemoteLink for Generation {
    fn is_live(&self) -> bool {
        self.stream.is_connected()
    }

    async fn send_reliable(&self, packet: &InputPacket) -> Result<(), LinkError> {
        self.reliable.send(packet).await
    }

    async fn send_datagram(&self, packet: &InputPacket) -> Result<(), LinkError> {
        self.datagram.send(packet).await
    }
}
