//! Input capture seam for the host application.
//!
//! A capture backend observes the physical keyboard and mouse and hands each
//! event to the async runtime through an unbounded channel. While the router
//! is in remote mode the backend must also stop delivering those events to
//! the local desktop, otherwise the host would type into both machines.
//!
//! OS hook implementations live outside this crate; they plug in by
//! implementing [`InputSource`] and
//! [`CaptureControl`](crate::application::route_input::CaptureControl).
//! [`channel::ChannelInputSource`] is the in-process backend used by tests
//! and by the headless console.

use bridge_core::{InputPacket, MouseButton};
use tokio::sync::mpsc;

pub mod channel;

/// A physical input event as a capture backend reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A key was pressed. `vk_code` is the OS virtual-key code.
    KeyDown { vk_code: i32 },
    KeyUp { vk_code: i32 },
    /// Relative pointer motion in pixels.
    MouseMove { dx: i32, dy: i32 },
    MouseButtonDown { button: MouseButton },
    MouseButtonUp { button: MouseButton },
    /// Wheel motion; positive is away from the user.
    MouseWheel { delta: i32 },
}

impl RawInputEvent {
    /// Packet carrying this event, without sequence, timestamp, or modifiers.
    pub fn to_packet(self) -> InputPacket {
        match self {
            Self::KeyDown { vk_code } => InputPacket::key_down(vk_code),
            Self::KeyUp { vk_code } => InputPacket::key_up(vk_code),
            Self::MouseMove { dx, dy } => InputPacket::mouse_move(dx, dy),
            Self::MouseButtonDown { button } => InputPacket::mouse_button(button, true),
            Self::MouseButtonUp { button } => InputPacket::mouse_button(button, false),
            Self::MouseWheel { delta } => InputPacket::scroll(delta),
        }
    }
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture source is already running")]
    AlreadyStarted,
    #[error("capture source has not been started")]
    NotStarted,
    #[error("capture consumer has gone away")]
    ConsumerGone,
}

/// Produces captured input events.
pub trait InputSource: Send + Sync {
    /// Starts capturing and returns the receiving end of the event channel.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RawInputEvent>, CaptureError>;

    /// Stops capturing; the receiver returned by `start` then yields `None`.
    fn stop(&self);
}
