//! # bridge-net
//!
//! Everything that touches a socket: the two transports, LAN discovery, the
//! authenticated handshake, and the connection state machine that ties them
//! together for both the host and the client.
//!
//! # How a connection comes together (for beginners)
//!
//! 1. **Discovery** – the host shouts "I'm here, port N" on the LAN broadcast
//!    address every few seconds; the client listens for those beacons.
//! 2. **Handshake** – over a fresh TCP stream the host proves the client
//!    knows the shared secret (challenge/response) and hands it a random
//!    session key, itself encrypted under a hash of the secret.
//! 3. **Generation** – the stream, a UDP socket, and a cipher built from the
//!    session key are bundled into one [`session::Generation`]. Key events
//!    ride the stream, mouse events ride UDP, and both are sealed with
//!    AES-256-GCM.
//! 4. **Liveness** – the host sends heartbeats that the client echoes back.
//!    Too many unanswered heartbeats, or any transport fault, ends the
//!    generation and the [`session::ConnectionManager`] starts over.
//!
//! The role-specific parts (listen-and-accept versus discover-and-connect,
//! what to do while connected) plug into the manager through the
//! [`session::Role`] trait; the host and client crates each implement it.

pub mod channel;
pub mod discovery;
pub mod handshake;
pub mod session;
pub mod transport;

pub use channel::{LinkError, PacketChannel, RemoteLink};
pub use discovery::{DiscoveredHost, DiscoveryError};
pub use handshake::{Handshake, HandshakeRole, LocalIdentity, SessionInfo};
pub use session::{
    Acquired, ConnectionError, ConnectionManager, ConnectionState, Generation, HeartbeatConfig,
    LatencyFeed, Role, SessionEnd, SessionTiming, StateNotifier,
};
pub use transport::{DatagramTransport, MemoryTransport, StreamTransport, Transport, TransportError};
