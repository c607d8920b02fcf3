//! The reconnecting connection state machine.
//!
//! # The cycle (for beginners)
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!   Disconnected ─► Discovering ─► Connecting ─► Connected  │
//!                      ▲   ▲          │  │          │       │
//!                      │   └─rejected─┘  │          │       │
//!                      │   (retry delay) │ fault    │ ended │
//!                      │                 ▼          ▼       │
//!                      └──(delay)── Reconnecting ◄──┘───────┘
//! ```
//!
//! What "Discovering" and "Connected" actually do depends on the side:
//! the host listens and accepts, the client listens for beacons and
//! connects. That variation lives behind the [`Role`] trait; everything
//! else (handshake under a timeout, building the [`Generation`], state
//! publication, delays, cancellation) is shared here.
//!
//! Exactly one generation exists at a time. It is created after the
//! handshake, handed to [`Role::drive`], closed when `drive` returns, and
//! dropped before the next attempt starts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::config::TimingConfig;
use bridge_core::SharedSecret;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::generation::Generation;
use super::heartbeat::HeartbeatExit;
use super::latency::LatencyFeed;
use super::state::{ConnectionState, StateNotifier};
use crate::channel::LinkError;
use crate::discovery::DiscoveryError;
use crate::handshake::{Handshake, HandshakeRole, LocalIdentity};
use crate::transport::{DatagramTransport, StreamTransport, TransportError};

/// Errors that end one connection attempt. None of them stop the manager.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(SocketAddr),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A freshly opened stream, ready for the handshake.
pub struct Acquired {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Name learned before the handshake (the client knows it from the beacon).
    pub peer_name: Option<String>,
}

/// Why a connected session ended.
#[derive(Debug)]
pub enum SessionEnd {
    Cancelled,
    MissedHeartbeats(u32),
    LinkFailed(LinkError),
    /// The stream reported itself down without a specific error.
    LinkLost,
}

impl From<HeartbeatExit> for SessionEnd {
    fn from(exit: HeartbeatExit) -> Self {
        match exit {
            HeartbeatExit::Cancelled => Self::Cancelled,
            HeartbeatExit::MissedHeartbeats(n) => Self::MissedHeartbeats(n),
            HeartbeatExit::LinkFailed(e) => Self::LinkFailed(e),
        }
    }
}

/// The side-specific half of the connection cycle.
#[async_trait]
pub trait Role: Send + Sync {
    /// Short label for logs ("host", "client").
    fn name(&self) -> &'static str;

    fn handshake_role(&self) -> HandshakeRole;

    /// Produces the next stream to handshake on. Runs while the state is
    /// `Discovering`; may advance it to `Connecting` itself once a peer is
    /// chosen. Returns `Ok(None)` only when `cancel` fired.
    async fn acquire(
        &self,
        state: &StateNotifier,
        cancel: &CancellationToken,
    ) -> Result<Option<Acquired>, ConnectionError>;

    /// Opens this side's datagram transport for a session with `peer`.
    async fn open_datagram(&self, peer: SocketAddr) -> Result<DatagramTransport, ConnectionError>;

    /// Runs the connected session until it ends.
    async fn drive(
        &self,
        generation: Arc<Generation>,
        latency: &LatencyFeed,
        cancel: &CancellationToken,
    ) -> SessionEnd;

    /// Called after every session and once more on shutdown. Must leave the
    /// local machine safe (input routed locally, nothing held down).
    async fn on_disconnect(&self);

    /// Pause in `Reconnecting` before the next attempt.
    fn reconnect_delay(&self) -> Duration;
}

/// Timings the manager applies regardless of role.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub handshake_timeout: Duration,
    pub handshake_retry_delay: Duration,
}

impl SessionTiming {
    pub fn from_config(timing: &TimingConfig) -> Self {
        Self {
            handshake_timeout: timing.handshake_timeout(),
            handshake_retry_delay: timing.handshake_retry_delay(),
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}

enum Attempt {
    Cancelled,
    Rejected,
    Ended(SessionEnd),
}

/// Drives one [`Role`] through connect, session, and reconnect until
/// cancelled.
pub struct ConnectionManager<R: Role> {
    role: Arc<R>,
    identity: LocalIdentity,
    secret: SharedSecret,
    timing: SessionTiming,
    state: StateNotifier,
    latency: LatencyFeed,
}

impl<R: Role> ConnectionManager<R> {
    pub fn new(role: Arc<R>, identity: LocalIdentity, secret: SharedSecret, timing: SessionTiming) -> Self {
        Self {
            role,
            identity,
            secret,
            timing,
            state: StateNotifier::new(),
            latency: LatencyFeed::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe_latency(&self) -> watch::Receiver<Option<u32>> {
        self.latency.subscribe()
    }

    pub fn role(&self) -> &Arc<R> {
        &self.role
    }

    /// Runs the cycle until `cancel` fires. Always ends in `Disconnected`
    /// after one final [`Role::on_disconnect`].
    pub async fn run(&self, cancel: CancellationToken) {
        let role = self.role.name();
        info!(role, "connection manager started");

        while !cancel.is_cancelled() {
            self.state.set(ConnectionState::Discovering);

            match self.attempt(&cancel).await {
                Ok(Attempt::Cancelled) => break,
                Ok(Attempt::Rejected) => {
                    if !pause(self.timing.handshake_retry_delay, &cancel).await {
                        break;
                    }
                    continue;
                }
                Ok(Attempt::Ended(SessionEnd::Cancelled)) => break,
                Ok(Attempt::Ended(end)) => info!(role, reason = ?end, "session ended"),
                Err(e) => warn!(role, error = %e, "connection attempt failed"),
            }

            self.role.on_disconnect().await;
            self.state.set(ConnectionState::Reconnecting);
            if !pause(self.role.reconnect_delay(), &cancel).await {
                break;
            }
        }

        self.role.on_disconnect().await;
        self.state.set(ConnectionState::Disconnected);
        info!(role, "connection manager stopped");
    }

    async fn attempt(&self, cancel: &CancellationToken) -> Result<Attempt, ConnectionError> {
        let Some(Acquired {
            mut stream,
            peer,
            peer_name,
        }) = self.role.acquire(&self.state, cancel).await?
        else {
            return Ok(Attempt::Cancelled);
        };
        self.state.set(ConnectionState::Connecting);

        let handshake = Handshake::new(&self.secret, &self.identity);
        let exchange = tokio::time::timeout(
            self.timing.handshake_timeout,
            handshake.perform(self.role.handshake_role(), &mut stream, peer_name.as_deref()),
        );
        let session = tokio::select! {
            _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
            outcome = exchange => match outcome {
                Err(_) => return Err(ConnectionError::HandshakeTimeout),
                Ok(None) => {
                    info!(%peer, "handshake rejected, retrying");
                    return Ok(Attempt::Rejected);
                }
                Ok(Some(session)) => session,
            },
        };

        let stream = StreamTransport::new(stream)?;
        let datagram = self.role.open_datagram(peer).await?;
        let generation = Arc::new(Generation::new(session, stream, datagram));

        let span = info_span!("generation", id = %generation.id(), peer = %generation.peer_hostname());
        let end = async {
            self.state.set(ConnectionState::Connected);
            info!(addr = %generation.peer(), version = %generation.peer_version(), "session established");
            let end = self
                .role
                .drive(Arc::clone(&generation), &self.latency, cancel)
                .await;
            generation.close().await;
            end
        }
        .instrument(span)
        .await;
        Ok(Attempt::Ended(end))
    }
}

/// Sleeps for `delay`; returns `false` if `cancel` fired first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A role whose every acquire fails, counting disconnect hooks.
    struct FailingRole {
        attempts: AtomicU32,
        disconnects: AtomicU32,
    }

    #[async_trait]
    impl Role for FailingRole {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn handshake_role(&self) -> HandshakeRole {
            HandshakeRole::Host
        }

        async fn acquire(
            &self,
            _state: &StateNotifier,
            _cancel: &CancellationToken,
        ) -> Result<Option<Acquired>, ConnectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ConnectionError::HandshakeTimeout)
        }

        async fn open_datagram(&self, _peer: SocketAddr) -> Result<DatagramTransport, ConnectionError> {
            unreachable!("acquire never succeeds")
        }

        async fn drive(
            &self,
            _generation: Arc<Generation>,
            _latency: &LatencyFeed,
            _cancel: &CancellationToken,
        ) -> SessionEnd {
            unreachable!("acquire never succeeds")
        }

        async fn on_disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn reconnect_delay(&self) -> Duration {
            Duration::from_millis(20)
        }
    }

    fn failing_manager() -> ConnectionManager<FailingRole> {
        ConnectionManager::new(
            Arc::new(FailingRole {
                attempts: AtomicU32::new(0),
                disconnects: AtomicU32::new(0),
            }),
            LocalIdentity::new("test"),
            SharedSecret::new("s"),
            SessionTiming::default(),
        )
    }

    #[tokio::test]
    async fn test_failed_attempt_passes_through_reconnecting_and_retries() {
        // Arrange
        let manager = Arc::new(failing_manager());
        let mut states = manager.subscribe_state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let manager = Arc::clone(&manager);
            let cancel = cancel.clone();
            async move { manager.run(cancel).await }
        });

        // Act
        states
            .wait_for(|s| *s == ConnectionState::Reconnecting)
            .await
            .expect("reached reconnecting");
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        task.await.expect("manager task");

        // Assert
        assert!(manager.role().attempts.load(Ordering::SeqCst) >= 2);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_cancel_runs_disconnect_hook_and_ends_disconnected() {
        // Arrange
        let manager = failing_manager();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Act
        manager.run(cancel).await;

        // Assert
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.role().disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.role().attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_timing_comes_from_config() {
        let timing = SessionTiming::from_config(&TimingConfig {
            handshake_timeout_ms: 750,
            ..TimingConfig::default()
        });
        assert_eq!(timing.handshake_timeout, Duration::from_millis(750));
        assert_eq!(timing.handshake_retry_delay, Duration::from_millis(1000));
    }
}
