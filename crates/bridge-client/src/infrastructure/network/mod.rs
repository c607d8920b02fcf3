//! Network infrastructure for the client application.
//!
//! [`ClientRole`] is the client's half of the shared connection state
//! machine:
//!
//! - **Acquire** – listen for host beacons for one discovery window, pick the
//!   first host heard, and open the stream to it under the connect timeout.
//!   An empty window simply starts another one. With a fixed host address
//!   configured, discovery is skipped.
//! - **Datagrams** – receive-only, on `host_port - 1`, accepting only the
//!   host's source address.
//! - **Drive** – run the [`PacketListener`] on both transports while polling
//!   the stream's liveness.
//! - **Disconnect** – release every key and button the host left held.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::config::{datagram_port_for, AppConfig};
use bridge_net::discovery::{listen_for_hosts, DiscoveredHost};
use bridge_net::handshake::HandshakeRole;
use bridge_net::{
    Acquired, ConnectionError, ConnectionState, DatagramTransport, Generation, LatencyFeed,
    RemoteLink, Role, SessionEnd, StateNotifier,
};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::dispatch_input::InputDispatcher;
use crate::application::packet_listener::{ListenerExit, PacketListener};

/// Everything the client role needs from configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// UDP port beacons arrive on.
    pub discovery_port: u16,
    pub discovery_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    /// How often a connected session checks that the stream is still up.
    pub liveness_poll: Duration,
    /// Connect here directly instead of waiting for beacons.
    pub host: Option<SocketAddr>,
}

impl ClientSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let timing = &config.timing;
        Self {
            discovery_port: config.network.discovery_port,
            discovery_timeout: timing.discovery_timeout(),
            connect_timeout: timing.connect_timeout(),
            reconnect_delay: timing.client_reconnect_delay(),
            liveness_poll: timing.liveness_poll(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: Option<SocketAddr>) -> Self {
        self.host = host;
        self
    }
}

pub struct ClientRole {
    settings: ClientSettings,
    listener: PacketListener,
}

impl ClientRole {
    pub fn new(settings: ClientSettings, dispatcher: Arc<InputDispatcher>) -> Self {
        Self {
            settings,
            listener: PacketListener::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Arc<InputDispatcher> {
        self.listener.dispatcher()
    }

    /// Waits for beacons until a host is heard. `Ok(None)` when cancelled.
    async fn discover(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<DiscoveredHost>, ConnectionError> {
        loop {
            let hosts = listen_for_hosts(
                self.settings.discovery_port,
                self.settings.discovery_timeout,
                cancel,
            )
            .await?;
            if cancel.is_cancelled() {
                return Ok(None);
            }
            match hosts.into_iter().next() {
                Some(host) => return Ok(Some(host)),
                None => debug!("no host heard, listening again"),
            }
        }
    }
}

#[async_trait]
impl Role for ClientRole {
    fn name(&self) -> &'static str {
        "client"
    }

    fn handshake_role(&self) -> HandshakeRole {
        HandshakeRole::Client
    }

    async fn acquire(
        &self,
        state: &StateNotifier,
        cancel: &CancellationToken,
    ) -> Result<Option<Acquired>, ConnectionError> {
        let (addr, peer_name) = match self.settings.host {
            Some(addr) => (addr, None),
            None => match self.discover(cancel).await? {
                Some(host) => (host.stream_addr(), Some(host.hostname)),
                None => return Ok(None),
            },
        };

        state.set(ConnectionState::Connecting);
        info!(%addr, host = peer_name.as_deref().unwrap_or("-"), "connecting");
        let connect = tokio::time::timeout(self.settings.connect_timeout, TcpStream::connect(addr));
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            result = connect => match result {
                Err(_) => return Err(ConnectionError::ConnectTimeout(addr)),
                Ok(Err(source)) => return Err(ConnectionError::Connect { addr, source }),
                Ok(Ok(stream)) => stream,
            },
        };

        Ok(Some(Acquired {
            stream,
            peer: addr,
            peer_name,
        }))
    }

    async fn open_datagram(&self, peer: SocketAddr) -> Result<DatagramTransport, ConnectionError> {
        let port = datagram_port_for(peer.port());
        debug!(port, source = %peer.ip(), "listening for mouse datagrams");
        Ok(DatagramTransport::receiver_from(port, peer.ip()).await?)
    }

    async fn drive(
        &self,
        generation: Arc<Generation>,
        latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let listen = self
            .listener
            .run(generation.reliable(), generation.datagram(), latency, cancel);
        tokio::select! {
            exit = listen => match exit {
                ListenerExit::Cancelled => SessionEnd::Cancelled,
                ListenerExit::Reliable(e) | ListenerExit::Datagram(e) => SessionEnd::LinkFailed(e),
            },
            () = wait_until_dead(&generation, self.settings.liveness_poll) => SessionEnd::LinkLost,
        }
    }

    async fn on_disconnect(&self) {
        self.dispatcher().reset();
    }

    fn reconnect_delay(&self) -> Duration {
        self.settings.reconnect_delay
    }
}

/// Resolves once the stream stops reporting itself live.
async fn wait_until_dead(generation: &Generation, poll: Duration) {
    let mut ticker = tokio::time::interval(poll);
    loop {
        ticker.tick().await;
        if !generation.is_live() {
            info!("stream no longer live");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_injection::mock::MockInputInjector;
    use std::net::Ipv4Addr;

    fn role(host: Option<SocketAddr>) -> ClientRole {
        let settings = ClientSettings {
            discovery_port: 0,
            discovery_timeout: Duration::from_millis(50),
            connect_timeout: Duration::from_millis(200),
            reconnect_delay: Duration::from_millis(10),
            liveness_poll: Duration::from_millis(10),
            host,
        };
        let dispatcher = Arc::new(InputDispatcher::new(Arc::new(MockInputInjector::new())));
        ClientRole::new(settings, dispatcher)
    }

    #[test]
    fn test_settings_follow_config() {
        // Arrange
        let mut config = AppConfig::default();
        config.network.discovery_port = 9202;
        config.timing.liveness_poll_ms = 250;

        // Act
        let settings = ClientSettings::from_config(&config);

        // Assert
        assert_eq!(settings.discovery_port, 9202);
        assert_eq!(settings.liveness_poll, Duration::from_millis(250));
        assert_eq!(settings.reconnect_delay, Duration::from_millis(3000));
        assert!(settings.host.is_none());
    }

    #[tokio::test]
    async fn test_fixed_host_is_connected_without_discovery() {
        // Arrange
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let role = role(Some(addr));
        let state = StateNotifier::new();

        // Act
        let acquired = role
            .acquire(&state, &CancellationToken::new())
            .await
            .expect("acquire")
            .expect("not cancelled");

        // Assert
        assert_eq!(acquired.peer, addr);
        assert!(acquired.peer_name.is_none());
        assert_eq!(state.current(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        // Arrange – grab a free port, then close it
        let addr = {
            let probe = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                .await
                .expect("bind");
            probe.local_addr().expect("addr")
        };
        let role = role(Some(addr));

        // Act
        let result = role.acquire(&StateNotifier::new(), &CancellationToken::new()).await;

        // Assert
        assert!(matches!(
            result,
            Err(ConnectionError::Connect { .. }) | Err(ConnectionError::ConnectTimeout(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_discovery_returns_none() {
        // Arrange
        let role = role(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Act
        let result = role.acquire(&StateNotifier::new(), &cancel).await;

        // Assert
        assert!(matches!(result, Ok(None)));
    }
}
