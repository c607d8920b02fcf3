//! Network infrastructure for the host application.
//!
//! [`HostRole`] is the host's half of the shared connection state machine:
//!
//! - **Acquire** – bind the stream listener, announce it with discovery
//!   beacons, and wait for one client to connect. Beaconing stops as soon as
//!   a client is accepted.
//! - **Datagrams** – send-only, to `client_ip : reliable_port - 1`.
//! - **Drive** – hand the new connection to the [`InputRouter`] and run the
//!   heartbeat loop until the client goes quiet or the stream fails.
//! - **Disconnect** – take the connection away from the router, which drops
//!   back to local input if it was remote.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::config::{datagram_port_for, AppConfig, ConfigError};
use bridge_net::discovery::{broadcast_presence, Beacon};
use bridge_net::handshake::HandshakeRole;
use bridge_net::session::run_heartbeat;
use bridge_net::{
    Acquired, ConnectionError, DatagramTransport, Generation, HeartbeatConfig, LatencyFeed, Role,
    SessionEnd, StateNotifier,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::route_input::InputRouter;

/// Everything the host role needs from configuration.
#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Address the stream listener binds. Port 0 picks a free port per attempt.
    pub bind_addr: SocketAddr,
    /// Name announced in beacons.
    pub hostname: String,
    /// Where beacons are sent.
    pub beacon_target: SocketAddr,
    pub broadcast_interval: Duration,
    pub heartbeat: HeartbeatConfig,
    pub reconnect_delay: Duration,
}

impl HostSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an address in `config` does not parse.
    pub fn from_config(config: &AppConfig, hostname: impl Into<String>) -> Result<Self, ConfigError> {
        let network = &config.network;
        let timing = &config.timing;
        Ok(Self {
            bind_addr: SocketAddr::new(network.bind_ip()?, network.reliable_port),
            hostname: hostname.into(),
            beacon_target: SocketAddr::new(network.broadcast_ip()?, network.discovery_port),
            broadcast_interval: timing.broadcast_interval(),
            heartbeat: HeartbeatConfig {
                interval: timing.heartbeat_interval(),
                max_missed: timing.max_missed_heartbeats,
            },
            reconnect_delay: timing.host_reconnect_delay(),
        })
    }
}

pub struct HostRole {
    settings: HostSettings,
    router: Arc<Mutex<InputRouter>>,
    /// Port the listener actually bound on the current attempt.
    bound_port: AtomicU16,
}

impl HostRole {
    pub fn new(settings: HostSettings, router: Arc<Mutex<InputRouter>>) -> Self {
        let bound_port = AtomicU16::new(settings.bind_addr.port());
        Self {
            settings,
            router,
            bound_port,
        }
    }

    pub fn router(&self) -> &Arc<Mutex<InputRouter>> {
        &self.router
    }
}

#[async_trait]
impl Role for HostRole {
    fn name(&self) -> &'static str {
        "host"
    }

    fn handshake_role(&self) -> HandshakeRole {
        HandshakeRole::Host
    }

    async fn acquire(
        &self,
        _state: &StateNotifier,
        cancel: &CancellationToken,
    ) -> Result<Option<Acquired>, ConnectionError> {
        let addr = self.settings.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ConnectionError::Bind { addr, source })?;
        let port = listener.local_addr().map(|a| a.port()).unwrap_or(addr.port());
        self.bound_port.store(port, Ordering::Release);
        info!(%addr, port, "waiting for a client");

        let beacon = Beacon {
            hostname: self.settings.hostname.clone(),
            port,
            target: self.settings.beacon_target,
            interval: self.settings.broadcast_interval,
        };
        let beacon_cancel = cancel.child_token();
        let beacon_task = tokio::spawn({
            let token = beacon_cancel.clone();
            async move {
                if let Err(e) = broadcast_presence(beacon, token).await {
                    warn!(error = %e, "presence broadcast unavailable");
                }
            }
        });

        let accepted = tokio::select! {
            _ = cancel.cancelled() => None,
            accepted = listener.accept() => Some(accepted),
        };
        beacon_cancel.cancel();
        if let Err(e) = beacon_task.await {
            debug!(error = %e, "beacon task ended abnormally");
        }

        match accepted {
            None => Ok(None),
            Some(Err(e)) => Err(ConnectionError::Accept(e)),
            Some(Ok((stream, peer))) => {
                info!(%peer, "client connected");
                Ok(Some(Acquired {
                    stream,
                    peer,
                    peer_name: None,
                }))
            }
        }
    }

    async fn open_datagram(&self, peer: SocketAddr) -> Result<DatagramTransport, ConnectionError> {
        let port = datagram_port_for(self.bound_port.load(Ordering::Acquire));
        let target = SocketAddr::new(peer.ip(), port);
        debug!(%target, "mouse datagrams will be sent here");
        Ok(DatagramTransport::sender(target).await?)
    }

    async fn drive(
        &self,
        generation: Arc<Generation>,
        latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        self.router.lock().await.set_transports(generation.clone());
        run_heartbeat(generation.reliable(), &self.settings.heartbeat, latency, cancel)
            .await
            .into()
    }

    async fn on_disconnect(&self) {
        self.router.lock().await.handle_disconnect();
    }

    fn reconnect_delay(&self) -> Duration {
        self.settings.reconnect_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        // Arrange
        let mut config = AppConfig::default();
        config.network.reliable_port = 9100;
        config.network.bind_address = "127.0.0.1".to_string();
        config.timing.max_missed_heartbeats = 7;

        // Act
        let settings = HostSettings::from_config(&config, "desk").expect("settings");

        // Assert
        assert_eq!(settings.bind_addr, "127.0.0.1:9100".parse().expect("addr"));
        assert_eq!(settings.beacon_target, "255.255.255.255:7202".parse().expect("addr"));
        assert_eq!(settings.heartbeat.max_missed, 7);
        assert_eq!(settings.heartbeat.interval, Duration::from_millis(2000));
        assert_eq!(settings.reconnect_delay, Duration::from_millis(2000));
        assert_eq!(settings.hostname, "desk");
    }

    #[test]
    fn test_settings_reject_bad_bind_address() {
        let mut config = AppConfig::default();
        config.network.bind_address = "not-an-ip".to_string();
        assert!(HostSettings::from_config(&config, "desk").is_err());
    }
}
