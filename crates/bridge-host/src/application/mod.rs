//! Application layer use cases for the host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (packet types and wire rules in `bridge_core`) and the infrastructure
//! (OS hooks, sockets, the console).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal, such as "send this
//!   keystroke to the client".
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the infrastructure can be swapped without changing this code.
//! - **Contain no OS calls and no socket setup**. Packets leave through the
//!   [`RemoteLink`](bridge_net::RemoteLink) seam.
//!
//! # Sub-modules
//!
//! - **`route_input`** – Receives raw input events and decides whether to
//!   leave them local or forward them to the connected client. Runs on every
//!   keystroke and mouse movement.

pub mod route_input;
