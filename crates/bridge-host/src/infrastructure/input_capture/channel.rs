//! In-process input source.
//!
//! Events are pushed in with [`ChannelInputSource::inject`] instead of being
//! read from OS hooks. Used by tests and by the headless console, where the
//! operator types events at the prompt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::{CaptureError, InputSource, RawInputEvent};
use crate::application::route_input::CaptureControl;

#[derive(Default)]
pub struct ChannelInputSource {
    sender: Mutex<Option<mpsc::UnboundedSender<RawInputEvent>>>,
    remote: AtomicBool,
}

impl ChannelInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` as if it had been captured from hardware.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NotStarted`] before `start` (or after `stop`)
    /// and [`CaptureError::ConsumerGone`] if the receiver was dropped.
    pub fn inject(&self, event: RawInputEvent) -> Result<(), CaptureError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(CaptureError::NotStarted)?;
        sender.send(event).map_err(|_| CaptureError::ConsumerGone)
    }

    /// `true` while captured input is withheld from the local desktop.
    pub fn is_remote(&self) -> bool {
        self.remote.load(Ordering::Acquire)
    }
}

impl InputSource for ChannelInputSource {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RawInputEvent>, CaptureError> {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|s| !s.is_closed()) {
            return Err(CaptureError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel.
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CaptureControl for ChannelInputSource {
    fn set_remote_mode(&self, remote: bool) {
        debug!(remote, "capture delivery mode changed");
        self.remote.store(remote, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_event_reaches_receiver() {
        // Arrange
        let source = ChannelInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source
            .inject(RawInputEvent::KeyDown { vk_code: 0x41 })
            .expect("inject");

        // Assert
        assert_eq!(
            rx.try_recv().expect("event"),
            RawInputEvent::KeyDown { vk_code: 0x41 }
        );
    }

    #[test]
    fn test_inject_before_start_is_an_error() {
        let source = ChannelInputSource::new();
        assert!(matches!(
            source.inject(RawInputEvent::MouseWheel { delta: 1 }),
            Err(CaptureError::NotStarted)
        ));
    }

    #[test]
    fn test_second_start_while_running_is_rejected() {
        let source = ChannelInputSource::new();
        let _rx = source.start().expect("first start");
        assert!(matches!(source.start(), Err(CaptureError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_stop_closes_channel() {
        // Arrange
        let source = ChannelInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source.stop();

        // Assert
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_remote_mode_flag_follows_capture_control() {
        let source = ChannelInputSource::new();
        assert!(!source.is_remote());
        source.set_remote_mode(true);
        assert!(source.is_remote());
        source.set_remote_mode(false);
        assert!(!source.is_remote());
    }
}
