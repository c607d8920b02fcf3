//! bridge-client library entry point.
//!
//! The binary in `main.rs` and the integration tests in `tests/` share this
//! module tree.
//!
//! # What does bridge-client do? (for beginners)
//!
//! The *client* is the computer being driven. It has no say in when input
//! arrives; the host decides that. The client application:
//!
//! 1. Listens for the host's discovery beacon on the LAN (or connects to a
//!    fixed address).
//! 2. Proves it knows the shared secret and receives a per-session key.
//! 3. Receives sealed input packets: keys over the TCP stream, mouse traffic
//!    over UDP.
//! 4. Replays them through an [`InputInjector`](application::dispatch_input::InputInjector),
//!    echoing the host's heartbeats so the host knows it is still here.
//! 5. Releases anything still held down whenever the connection drops.

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: injection adapters and the network role.
pub mod infrastructure;
