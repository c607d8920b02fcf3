//! bridge-host library entry point.
//!
//! The host owns the physical keyboard and mouse. It announces itself on the
//! LAN, accepts one client at a time, and forwards input to that client while
//! routing is in remote mode.
//!
//! The binary in `main.rs` and the integration tests in `tests/` share this
//! module tree.

pub mod application;
pub mod infrastructure;
