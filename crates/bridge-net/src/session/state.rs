//! Observable connection state.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Where a [`ConnectionManager`](super::ConnectionManager) is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not running, or stopped.
    Disconnected,
    /// Host: listening for a client. Client: collecting beacons.
    Discovering,
    /// A stream exists and the handshake is in progress.
    Connecting,
    /// Handshake succeeded and both transports are up.
    Connected,
    /// The last attempt or session ended; waiting before the next one.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Publishes state changes to any number of observers.
///
/// Setting the state it already holds is a no-op, so observers only ever
/// wake for real transitions.
#[derive(Clone)]
pub struct StateNotifier {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateNotifier {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, next: ConnectionState) {
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            info!(state = %next, "connection state changed");
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for StateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        assert_eq!(StateNotifier::new().current(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_repeated_state_does_not_wake_observers() {
        // Arrange
        let notifier = StateNotifier::new();
        let mut rx = notifier.subscribe();

        // Act
        notifier.set(ConnectionState::Discovering);
        rx.changed().await.expect("first change");
        rx.borrow_and_update();
        notifier.set(ConnectionState::Discovering);

        // Assert
        assert!(!rx.has_changed().expect("sender alive"));
        assert_eq!(notifier.current(), ConnectionState::Discovering);
    }

    #[test]
    fn test_display_is_lowercase_name() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
