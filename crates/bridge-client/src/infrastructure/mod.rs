//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `application`, `bridge_core`
//! and `bridge_net`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`input_injection`** – Implementations of `InputInjector`: a logging
//!   injector for headless runs and a recording mock for tests.
//!
//! - **`network`** – The client's connection role: discovery, connect, the
//!   datagram receiver, and the connected-session driver.

pub mod input_injection;
pub mod network;
