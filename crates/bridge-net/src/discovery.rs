//! UDP broadcast discovery.
//!
//! The host periodically broadcasts a one-line ASCII beacon on the discovery
//! port; a client that wants to connect listens on that port for a while and
//! collects every host it hears from.
//!
//! Beacon format:
//! ```text
//! INPUTBRIDGE_DISCOVER:v1:<hostname>:<reliable port>
//! ```
//!
//! # How UDP discovery works (for beginners)
//!
//! A datagram sent to the LAN broadcast address (`255.255.255.255`) is
//! delivered to every machine on the segment that has a socket bound to the
//! destination port. The client never needs to know the host's address in
//! advance: the source address of a beacon *is* the host's address, and the
//! beacon body carries the port to connect to.
//!
//! Broadcasts do not cross routers, so discovery only works on one subnet.
//! Anything on the port that does not start with the magic prefix is
//! ignored, as are beacons with a missing hostname or an unparsable port.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Fixed port beacons are sent to.
pub const DISCOVERY_PORT: u16 = 7202;

/// Literal token every beacon starts with.
pub const DISCOVERY_MAGIC: &str = "INPUTBRIDGE_DISCOVER";

/// Beacon format version.
pub const DISCOVERY_VERSION_TAG: &str = "v1";

/// Pause before reading again after a transient socket error.
const RECV_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Error type for discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Broadcasting could not be enabled on the beacon socket.
    #[error("failed to enable broadcast: {0}")]
    Broadcast(#[source] std::io::Error),
}

/// A host heard during one discovery window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    pub hostname: String,
    /// Source address of the beacon.
    pub address: IpAddr,
    /// Reliable-stream port the host advertised.
    pub port: u16,
    pub discovered_at: SystemTime,
}

impl DiscoveredHost {
    pub fn stream_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

// ── Beacon text ───────────────────────────────────────────────────────────────

/// Renders the beacon a host broadcasts.
pub fn format_beacon(hostname: &str, port: u16) -> String {
    format!("{DISCOVERY_MAGIC}:{DISCOVERY_VERSION_TAG}:{hostname}:{port}")
}

/// Extracts `(hostname, port)` from a beacon, or `None` if it is not one.
pub fn parse_beacon(datagram: &[u8]) -> Option<(String, u16)> {
    let text = std::str::from_utf8(datagram).ok()?;
    let rest = text
        .strip_prefix(DISCOVERY_MAGIC)?
        .strip_prefix(':')?
        .strip_prefix(DISCOVERY_VERSION_TAG)?
        .strip_prefix(':')?;
    let (hostname, port) = rest.rsplit_once(':')?;
    if hostname.is_empty() {
        return None;
    }
    let port = port.trim().parse::<u16>().ok()?;
    Some((hostname.to_string(), port))
}

// ── Host side ─────────────────────────────────────────────────────────────────

/// What a host announces and where.
#[derive(Debug, Clone)]
pub struct Beacon {
    pub hostname: String,
    pub port: u16,
    pub target: SocketAddr,
    pub interval: Duration,
}

impl Beacon {
    /// Beacon aimed at the LAN broadcast address on [`DISCOVERY_PORT`].
    pub fn lan(hostname: impl Into<String>, port: u16, interval: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            target: SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            interval,
        }
    }
}

/// Sends the beacon every `interval` until `cancel` fires.
///
/// Individual send failures are logged and the loop keeps going; an
/// unplugged cable should not stop the host from announcing once it returns.
///
/// # Errors
///
/// Returns [`DiscoveryError`] if the beacon socket cannot be set up.
pub async fn broadcast_presence(
    beacon: Beacon,
    cancel: CancellationToken,
) -> Result<(), DiscoveryError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|source| DiscoveryError::BindFailed { addr, source })?;
    socket
        .set_broadcast(true)
        .map_err(DiscoveryError::Broadcast)?;

    let message = format_beacon(&beacon.hostname, beacon.port);
    info!(dest = %beacon.target, port = beacon.port, "broadcasting presence");

    loop {
        match socket.send_to(message.as_bytes(), beacon.target).await {
            Ok(_) => trace!(dest = %beacon.target, "beacon sent"),
            Err(e) => warn!(dest = %beacon.target, error = %e, "beacon send failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("presence broadcast stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(beacon.interval) => {}
        }
    }
}

// ── Client side ───────────────────────────────────────────────────────────────

/// A socket bound to the discovery port, ready to collect beacons.
pub struct DiscoveryListener {
    socket: UdpSocket,
}

impl DiscoveryListener {
    /// Binds `0.0.0.0:port`. Pass `0` in tests to get an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::BindFailed`] if the port is unavailable.
    pub async fn bind(port: u16) -> Result<Self, DiscoveryError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DiscoveryError::BindFailed { addr, source })?;
        Ok(Self { socket })
    }

    /// Port the listener actually bound.
    pub fn local_port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Collects beacons until `window` elapses or `cancel` fires, then returns
    /// every distinct host heard, in first-heard order. Hosts are keyed by
    /// source IP; a later beacon from the same IP replaces the earlier entry.
    pub async fn collect(&self, window: Duration, cancel: &CancellationToken) -> Vec<DiscoveredHost> {
        let mut hosts: Vec<DiscoveredHost> = Vec::new();
        let mut buf = [0u8; 512];
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = &mut deadline => break,
                received = self.socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(pair) => pair,
                        Err(e) if is_transient(&e) => {
                            debug!(error = %e, "discovery recv error, retrying");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = &mut deadline => break,
                                _ = tokio::time::sleep(RECV_RETRY_PAUSE) => continue,
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "discovery socket failed, ending window early");
                            break;
                        }
                    };
                    let Some((hostname, port)) = parse_beacon(&buf[..len]) else {
                        trace!(%from, "ignoring non-beacon datagram");
                        continue;
                    };
                    record_host(
                        &mut hosts,
                        DiscoveredHost {
                            hostname,
                            address: from.ip(),
                            port,
                            discovered_at: SystemTime::now(),
                        },
                    );
                }
            }
        }

        debug!(count = hosts.len(), "discovery window closed");
        hosts
    }
}

/// `true` for receive errors a UDP socket recovers from on its own, such as
/// an ICMP port-unreachable surfacing as a reset.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Binds the discovery port and collects beacons for `window`.
///
/// An empty list is a normal outcome: nobody is broadcasting yet.
///
/// # Errors
///
/// Returns [`DiscoveryError::BindFailed`] if the port is unavailable.
pub async fn listen_for_hosts(
    port: u16,
    window: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<DiscoveredHost>, DiscoveryError> {
    let listener = DiscoveryListener::bind(port).await?;
    Ok(listener.collect(window, cancel).await)
}

fn record_host(hosts: &mut Vec<DiscoveredHost>, host: DiscoveredHost) {
    match hosts.iter_mut().find(|known| known.address == host.address) {
        Some(known) => *known = host,
        None => {
            info!(hostname = %host.hostname, address = %host.address, port = host.port, "discovered host");
            hosts.push(host);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_round_trips_through_text() {
        let text = format_beacon("TestPC", 45000);
        assert_eq!(text, "INPUTBRIDGE_DISCOVER:v1:TestPC:45000");
        assert_eq!(
            parse_beacon(text.as_bytes()),
            Some(("TestPC".to_string(), 45000))
        );
    }

    #[test]
    fn test_parse_beacon_rejects_foreign_and_malformed_datagrams() {
        let datagrams: [&[u8]; 7] = [
            b"HELLO:v1:TestPC:45000",
            b"INPUTBRIDGE_DISCOVER:v2:TestPC:45000",
            b"INPUTBRIDGE_DISCOVER:v1:TestPC",
            b"INPUTBRIDGE_DISCOVER:v1::45000",
            b"INPUTBRIDGE_DISCOVER:v1:TestPC:port",
            b"INPUTBRIDGE_DISCOVER:v1:TestPC:70000",
            b"\xFF\xFE",
        ];
        for datagram in datagrams {
            assert_eq!(parse_beacon(datagram), None, "{datagram:?}");
        }
    }

    #[test]
    fn test_record_host_dedups_by_address_latest_wins() {
        // Arrange
        let mut hosts = Vec::new();
        let address: IpAddr = "192.168.1.20".parse().expect("ip");
        let heard = |hostname: &str, port| DiscoveredHost {
            hostname: hostname.to_string(),
            address,
            port,
            discovered_at: SystemTime::now(),
        };

        // Act
        record_host(&mut hosts, heard("old-name", 7201));
        record_host(&mut hosts, heard("new-name", 7301));

        // Assert
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "new-name");
        assert_eq!(hosts[0].port, 7301);
    }

    #[tokio::test]
    async fn test_broadcasting_host_is_discovered_exactly_once() {
        // Arrange
        let listener = DiscoveryListener::bind(0).await.expect("bind listener");
        let cancel = CancellationToken::new();
        let beacon = Beacon {
            hostname: "TestPC".to_string(),
            port: 45000,
            target: SocketAddr::from((Ipv4Addr::LOCALHOST, listener.local_port())),
            interval: Duration::from_millis(40),
        };
        let broadcaster = tokio::spawn(broadcast_presence(beacon, cancel.clone()));

        // Act – long enough for several beacons to arrive
        let hosts = listener
            .collect(Duration::from_millis(400), &CancellationToken::new())
            .await;
        cancel.cancel();

        // Assert
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "TestPC");
        assert_eq!(hosts[0].port, 45000);
        assert_eq!(hosts[0].address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        broadcaster
            .await
            .expect("broadcaster task")
            .expect("broadcaster result");
    }

    #[test]
    fn test_only_recoverable_recv_errors_are_retried() {
        for kind in [io::ErrorKind::ConnectionReset, io::ErrorKind::Interrupted] {
            assert!(is_transient(&io::Error::from(kind)), "{kind:?} should be retried");
        }
        for kind in [io::ErrorKind::PermissionDenied, io::ErrorKind::InvalidInput] {
            assert!(!is_transient(&io::Error::from(kind)), "{kind:?} should end the window");
        }
    }

    #[tokio::test]
    async fn test_silent_network_yields_empty_list() {
        let listener = DiscoveryListener::bind(0).await.expect("bind");
        let hosts = listener
            .collect(Duration::from_millis(100), &CancellationToken::new())
            .await;
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_ends_collection_early() {
        // Arrange
        let listener = DiscoveryListener::bind(0).await.expect("bind");
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Act
        let started = std::time::Instant::now();
        let hosts = listener.collect(Duration::from_secs(30), &cancel).await;

        // Assert
        assert!(hosts.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
