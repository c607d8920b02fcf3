//! Application layer use cases for the client application.
//!
//! # What use cases does the client have?
//!
//! - **`dispatch_input`** – Replays received packets as local input through
//!   an injected [`InputInjector`](dispatch_input::InputInjector), tracking
//!   what is held down so it can be released later.
//!
//! - **`packet_listener`** – Drains both transports of a live session:
//!   echoes heartbeats, drops stale datagrams, and hands everything else to
//!   the dispatcher.

pub mod dispatch_input;
pub mod packet_listener;
