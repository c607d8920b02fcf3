//! # bridge-core
//!
//! Shared library for the input bridge containing the packet format, the
//! authenticated session cipher, key-derivation helpers, and the TOML
//! configuration schema.
//!
//! This crate is used by the networking layer and by both the host and
//! client applications. It has zero dependencies on sockets, async runtimes,
//! or OS input APIs, so everything in it can be unit tested in isolation.
//!
//! # Architecture overview (for beginners)
//!
//! The input bridge lets one computer's keyboard and mouse drive a second
//! computer over the LAN. The machine with the physical devices is the
//! **host**; the machine being driven is the **client**.
//!
//! This crate (`bridge-core`) is the shared foundation. It defines:
//!
//! - **`protocol`** – The fixed 24-byte [`InputPacket`] record that carries
//!   every key press, mouse move, heartbeat, and mode switch, plus sequence
//!   numbering for the lossy datagram path.
//!
//! - **`crypto`** – AES-256-GCM envelopes for packets, the pre-shared secret
//!   and session key types (both wiped from memory on drop), and the
//!   challenge/response and key-wrapping primitives used by the handshake.
//!
//! - **`config`** – The `AppConfig` TOML schema with defaults for every field.

pub mod config;
pub mod crypto;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `bridge_core::InputPacket` instead of `bridge_core::protocol::packet::InputPacket`.
pub use config::{default_config_path, load_config, AppConfig, ConfigError};
pub use crypto::{CryptoError, SessionCipher, SessionKey, SharedSecret};
pub use protocol::codec::{current_timestamp_ms, decode_packet, encode_packet, PacketError};
pub use protocol::packet::{EventType, InputPacket, ModifierFlags, MouseButton, PACKET_SIZE};
pub use protocol::sequence::{SequenceCounter, SequenceWindow};
