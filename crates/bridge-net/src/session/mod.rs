//! Connection lifecycle shared by host and client.
//!
//! - [`state`] – the five observable connection states and their notifier.
//! - [`latency`] – one-way and round-trip latency estimates.
//! - [`heartbeat`] – the host's heartbeat loop and missed-beat counting.
//! - [`generation`] – one authenticated connection's transports and cipher.
//! - [`manager`] – the reconnecting state machine and the [`Role`] seam.

pub mod generation;
pub mod heartbeat;
pub mod latency;
pub mod manager;
pub mod state;

pub use generation::Generation;
pub use heartbeat::{run_heartbeat, HeartbeatConfig, HeartbeatExit};
pub use latency::{halved_round_trip, one_way_delay, LatencyFeed};
pub use manager::{Acquired, ConnectionError, ConnectionManager, Role, SessionEnd, SessionTiming};
pub use state::{ConnectionState, StateNotifier};
