//! One-message-per-datagram transport over UDP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use super::{Transport, TransportError, MAX_MESSAGE_LEN};

/// Best-effort transport: each `send` is exactly one datagram.
///
/// UDP has no connection, so [`is_connected`](Transport::is_connected) is
/// always `true`; liveness comes from heartbeats on the stream transport.
pub struct DatagramTransport {
    socket: UdpSocket,
    remote: Option<SocketAddr>,
    expected_source: Option<IpAddr>,
}

impl DatagramTransport {
    /// Send-only transport on an ephemeral local port, addressed to `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if no local socket can be bound.
    pub async fn sender(remote: SocketAddr) -> Result<Self, TransportError> {
        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            remote: Some(remote),
            expected_source: None,
        })
    }

    /// Receive-only transport bound to `local_port` on all interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the port is already in use.
    pub async fn receiver(local_port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, local_port)).await?;
        Ok(Self {
            socket,
            remote: None,
            expected_source: None,
        })
    }

    /// Receive-only transport that discards datagrams not sent from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the port is already in use.
    pub async fn receiver_from(local_port: u16, source: IpAddr) -> Result<Self, TransportError> {
        let mut transport = Self::receiver(local_port).await?;
        transport.expected_source = Some(source);
        Ok(transport)
    }

    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the port is already in use.
    pub async fn bound(local_port: u16, remote: SocketAddr) -> Result<Self, TransportError> {
        let mut transport = Self::receiver(local_port).await?;
        transport.remote = Some(remote);
        Ok(transport)
    }

    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }
}

#[async_trait]
impl Transport for DatagramTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let remote = self.remote.ok_or(TransportError::NoRemote)?;
        if payload.len() > MAX_MESSAGE_LEN {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }
        self.socket.send_to(payload, remote).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; MAX_MESSAGE_LEN];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if let Some(expected) = self.expected_source {
                if from.ip() != expected {
                    debug!(%from, %expected, "dropping datagram from unexpected source");
                    continue;
                }
            }
            trace!(%from, len, "datagram received");
            buf.truncate(len);
            return Ok(buf);
        }
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback_receiver() -> (DatagramTransport, SocketAddr) {
        let receiver = DatagramTransport::receiver(0).await.expect("bind");
        let port = receiver.local_addr().expect("addr").port();
        (receiver, SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    #[tokio::test]
    async fn test_each_send_is_one_datagram() {
        // Arrange
        let (receiver, addr) = loopback_receiver().await;
        let sender = DatagramTransport::sender(addr).await.expect("sender");

        // Act
        sender.send(b"one").await.expect("send");
        sender.send(b"two").await.expect("send");

        // Assert
        assert_eq!(receiver.receive().await.expect("receive"), b"one");
        assert_eq!(receiver.receive().await.expect("receive"), b"two");
    }

    #[tokio::test]
    async fn test_receiver_without_remote_cannot_send() {
        let (receiver, _) = loopback_receiver().await;
        assert!(matches!(
            receiver.send(b"x").await,
            Err(TransportError::NoRemote)
        ));
    }

    #[tokio::test]
    async fn test_datagram_transport_always_reports_connected() {
        let (receiver, addr) = loopback_receiver().await;
        let sender = DatagramTransport::sender(addr).await.expect("sender");
        assert!(receiver.is_connected());
        assert!(sender.is_connected());
    }

    #[tokio::test]
    async fn test_receiver_from_discards_other_sources() {
        // Arrange – only accept traffic from an address nobody sends from
        let receiver =
            DatagramTransport::receiver_from(0, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
                .await
                .expect("bind");
        let port = receiver.local_addr().expect("addr").port();
        let sender = DatagramTransport::sender(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
            .await
            .expect("sender");

        // Act
        sender.send(b"ignored").await.expect("send");
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(200), receiver.receive()).await;

        // Assert
        assert!(result.is_err(), "datagram from loopback must be dropped");
    }
}
