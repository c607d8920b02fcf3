//! Integration tests for the connection manager over real loopback sockets.
//!
//! # What is exercised
//!
//! Two [`ConnectionManager`]s, one per side, run in the same process. The
//! roles here are minimal stand-ins for the host and client applications:
//! the host accepts on a pre-bound listener and runs heartbeats; the client
//! connects straight to that listener and echoes heartbeats back. Everything
//! between `acquire` and `drive` (handshake, generation, state publication)
//! is the real code path.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{EventType, SharedSecret};
use bridge_net::handshake::HandshakeRole;
use bridge_net::session::{run_heartbeat, HeartbeatConfig};
use bridge_net::{
    Acquired, ConnectionError, ConnectionManager, ConnectionState, DatagramTransport, Generation,
    LatencyFeed, LocalIdentity, Role, SessionEnd, SessionTiming, StateNotifier,
};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

// ── Test roles ────────────────────────────────────────────────────────────────

struct LoopbackHost {
    listener: TcpListener,
    client_datagram_port: u16,
    heartbeat: HeartbeatConfig,
}

#[async_trait]
impl Role for LoopbackHost {
    fn name(&self) -> &'static str {
        "test-host"
    }

    fn handshake_role(&self) -> HandshakeRole {
        HandshakeRole::Host
    }

    async fn acquire(
        &self,
        _state: &StateNotifier,
        cancel: &CancellationToken,
    ) -> Result<Option<Acquired>, ConnectionError> {
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            accepted = self.listener.accept() => {
                let (stream, peer) = accepted.map_err(ConnectionError::Accept)?;
                Ok(Some(Acquired { stream, peer, peer_name: None }))
            }
        }
    }

    async fn open_datagram(&self, peer: SocketAddr) -> Result<DatagramTransport, ConnectionError> {
        let target = SocketAddr::new(peer.ip(), self.client_datagram_port);
        Ok(DatagramTransport::sender(target).await?)
    }

    async fn drive(
        &self,
        generation: Arc<Generation>,
        latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        run_heartbeat(generation.reliable(), &self.heartbeat, latency, cancel)
            .await
            .into()
    }

    async fn on_disconnect(&self) {}

    fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(50)
    }
}

struct LoopbackClient {
    host: SocketAddr,
    datagram_port: u16,
    echo: AtomicBool,
}

#[async_trait]
impl Role for LoopbackClient {
    fn name(&self) -> &'static str {
        "test-client"
    }

    fn handshake_role(&self) -> HandshakeRole {
        HandshakeRole::Client
    }

    async fn acquire(
        &self,
        _state: &StateNotifier,
        _cancel: &CancellationToken,
    ) -> Result<Option<Acquired>, ConnectionError> {
        let stream = TcpStream::connect(self.host)
            .await
            .map_err(|source| ConnectionError::Connect {
                addr: self.host,
                source,
            })?;
        Ok(Some(Acquired {
            stream,
            peer: self.host,
            peer_name: Some("loopback-host".to_string()),
        }))
    }

    async fn open_datagram(&self, peer: SocketAddr) -> Result<DatagramTransport, ConnectionError> {
        Ok(DatagramTransport::receiver_from(self.datagram_port, peer.ip()).await?)
    }

    async fn drive(
        &self,
        generation: Arc<Generation>,
        _latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let reliable = generation.reliable();
        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                received = reliable.recv() => match received {
                    Ok(packet) => packet,
                    Err(e) => return SessionEnd::LinkFailed(e),
                },
            };
            if packet.event_type == EventType::Heartbeat && self.echo.load(Ordering::SeqCst) {
                if let Err(e) = reliable.send(&packet).await {
                    return SessionEnd::LinkFailed(e);
                }
            }
        }
    }

    async fn on_disconnect(&self) {}

    fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(50)
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Pair {
    host: Arc<ConnectionManager<LoopbackHost>>,
    client: Arc<ConnectionManager<LoopbackClient>>,
    cancel: CancellationToken,
}

async fn free_udp_port() -> u16 {
    let probe = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("probe");
    probe.local_addr().expect("addr").port()
}

fn fast_timing() -> SessionTiming {
    SessionTiming {
        handshake_timeout: Duration::from_secs(2),
        handshake_retry_delay: Duration::from_millis(100),
    }
}

async fn start_pair(host_secret: &str, client_secret: &str, max_missed: u32) -> Pair {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind");
    let host_addr = listener.local_addr().expect("addr");
    let datagram_port = free_udp_port().await;

    let host = Arc::new(ConnectionManager::new(
        Arc::new(LoopbackHost {
            listener,
            client_datagram_port: datagram_port,
            heartbeat: HeartbeatConfig {
                interval: Duration::from_millis(30),
                max_missed,
            },
        }),
        LocalIdentity::new("loopback-host"),
        SharedSecret::new(host_secret),
        fast_timing(),
    ));
    let client = Arc::new(ConnectionManager::new(
        Arc::new(LoopbackClient {
            host: host_addr,
            datagram_port,
            echo: AtomicBool::new(true),
        }),
        LocalIdentity::new("loopback-client"),
        SharedSecret::new(client_secret),
        fast_timing(),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let host = Arc::clone(&host);
        let cancel = cancel.clone();
        async move { host.run(cancel).await }
    });
    tokio::spawn({
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        async move { client.run(cancel).await }
    });

    Pair { host, client, cancel }
}

async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    wanted: ConnectionState,
) -> bool {
    tokio::time::timeout(Duration::from_secs(3), rx.wait_for(|s| *s == wanted))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// With the same secret on both sides the managers must reach `Connected`
/// and stay there while heartbeats are echoed.
#[tokio::test]
async fn test_matching_secrets_connect_and_stay_connected() {
    // Arrange
    let pair = start_pair("shared", "shared", 3).await;
    let mut host_state = pair.host.subscribe_state();
    let mut client_state = pair.client.subscribe_state();

    // Act
    let host_connected = wait_for_state(&mut host_state, ConnectionState::Connected).await;
    let client_connected = wait_for_state(&mut client_state, ConnectionState::Connected).await;
    // Ten heartbeat intervals, comfortably past max_missed.
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Assert
    assert!(host_connected);
    assert!(client_connected);
    assert_eq!(pair.host.state(), ConnectionState::Connected);
    assert!(pair.host.subscribe_latency().borrow().is_some());

    pair.cancel.cancel();
    assert!(wait_for_state(&mut host_state, ConnectionState::Disconnected).await);
    assert!(wait_for_state(&mut client_state, ConnectionState::Disconnected).await);
}

/// A client that stops echoing must be dropped by the host.
#[tokio::test]
async fn test_silent_client_sends_host_to_reconnecting() {
    // Arrange
    let pair = start_pair("shared", "shared", 3).await;
    let mut host_state = pair.host.subscribe_state();
    assert!(wait_for_state(&mut host_state, ConnectionState::Connected).await);

    // Act
    pair.client.role().echo.store(false, Ordering::SeqCst);

    // Assert
    assert!(wait_for_state(&mut host_state, ConnectionState::Reconnecting).await);
    pair.cancel.cancel();
}

/// Mismatched secrets must never produce a session on either side.
#[tokio::test]
async fn test_mismatched_secrets_never_connect() {
    // Arrange
    let pair = start_pair("host-secret", "client-secret", 3).await;
    let mut host_state = pair.host.subscribe_state();
    let mut client_state = pair.client.subscribe_state();

    // Act
    let host_connected = tokio::time::timeout(
        Duration::from_millis(800),
        host_state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await;
    let client_connected = tokio::time::timeout(
        Duration::from_millis(200),
        client_state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await;

    // Assert
    assert!(host_connected.is_err(), "host must not reach Connected");
    assert!(client_connected.is_err(), "client must not reach Connected");
    pair.cancel.cancel();
}
