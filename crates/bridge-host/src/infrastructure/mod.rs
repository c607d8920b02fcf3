//! Infrastructure layer for the host application.
//!
//! Contains OS-facing adapters: the input capture seam, the network role that
//! plugs into the shared connection manager, and the stdin control console.
//!
//! **Dependency rule**: this layer may depend on `application`, `bridge_core`
//! and `bridge_net`. The `application` layer only borrows the plain
//! [`RawInputEvent`](input_capture::RawInputEvent) data type from here.

pub mod console;
pub mod input_capture;
pub mod network;
