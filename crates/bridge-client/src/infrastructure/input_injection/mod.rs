//! Input injection adapters for the client.
//!
//! Platform injectors (SendInput, XTest, CGEvent) plug in by implementing
//! [`InputInjector`](crate::application::dispatch_input::InputInjector).
//! This crate ships two that need no desktop session:
//!
//! - **`logging`** – writes every event to the log. The headless binary uses
//!   it so a client can be run and observed on any machine.
//! - **`mock`** – records events in memory for tests.

pub mod logging;
pub mod mock;
