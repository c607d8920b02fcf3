//! The input packet record exchanged between host and client.
//!
//! Every event that crosses the wire – a key press, a mouse delta, a
//! heartbeat, a mode switch – is one [`InputPacket`]. The record is fixed
//! size (see [`PACKET_SIZE`]) regardless of the event kind; the meaning of
//! `data1` / `data2` depends on [`EventType`]:
//!
//! | Event type        | `data1`                  | `data2`  |
//! |-------------------|--------------------------|----------|
//! | `KeyDown`/`KeyUp` | virtual key code         | unused   |
//! | `MouseMove`       | horizontal delta         | vertical delta |
//! | `MouseButton*`    | [`MouseButton`] id       | unused   |
//! | `MouseScroll`     | wheel delta              | unused   |
//! | `SwitchNotify`    | 1 = remote, 0 = local    | unused   |
//! | `Heartbeat`       | unused                   | unused   |

use crate::protocol::codec::current_timestamp_ms;

/// Encoded size of every [`InputPacket`] in bytes.
pub const PACKET_SIZE: usize = 24;

/// Current packet layout version written into every packet.
pub const PACKET_VERSION: u8 = 1;

/// Sequence number that is never treated as stale by a receiver.
pub const UNSEQUENCED: u32 = 0;

/// Kind of event carried by a packet (byte 1 on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    KeyDown = 0,
    KeyUp = 1,
    MouseMove = 2,
    MouseButtonDown = 3,
    MouseButtonUp = 4,
    MouseScroll = 5,
    Heartbeat = 10,
    /// Reserved; the handshake runs as JSON lines before any packet flows.
    HandshakeRequest = 20,
    /// Reserved; see [`EventType::HandshakeRequest`].
    HandshakeResponse = 21,
    SwitchNotify = 30,
}

impl EventType {
    /// Returns `true` for key press and release events.
    pub fn is_keyboard(self) -> bool {
        matches!(self, EventType::KeyDown | EventType::KeyUp)
    }

    /// Returns `true` for mouse motion, button, and wheel events.
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            EventType::MouseMove
                | EventType::MouseButtonDown
                | EventType::MouseButtonUp
                | EventType::MouseScroll
        )
    }
}

impl TryFrom<u8> for EventType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::KeyDown),
            1 => Ok(EventType::KeyUp),
            2 => Ok(EventType::MouseMove),
            3 => Ok(EventType::MouseButtonDown),
            4 => Ok(EventType::MouseButtonUp),
            5 => Ok(EventType::MouseScroll),
            10 => Ok(EventType::Heartbeat),
            20 => Ok(EventType::HandshakeRequest),
            21 => Ok(EventType::HandshakeResponse),
            30 => Ok(EventType::SwitchNotify),
            other => Err(other),
        }
    }
}

/// Bitmask of modifier keys and mouse buttons held when the event occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierFlags(pub u16);

impl ModifierFlags {
    pub const SHIFT: u16 = 1 << 0;
    pub const CTRL: u16 = 1 << 1;
    pub const ALT: u16 = 1 << 2;
    pub const WIN: u16 = 1 << 3;
    pub const LEFT_BUTTON: u16 = 1 << 4;
    pub const RIGHT_BUTTON: u16 = 1 << 5;
    pub const MIDDLE_BUTTON: u16 = 1 << 6;

    /// No modifiers held.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if every bit in `mask` is set.
    pub fn contains(&self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    pub fn shift(&self) -> bool {
        self.contains(Self::SHIFT)
    }

    pub fn ctrl(&self) -> bool {
        self.contains(Self::CTRL)
    }

    pub fn alt(&self) -> bool {
        self.contains(Self::ALT)
    }

    pub fn win(&self) -> bool {
        self.contains(Self::WIN)
    }
}

/// Mouse button identifier carried in `data1` of button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
    X1 = 3,
    X2 = 4,
}

impl TryFrom<i32> for MouseButton {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MouseButton::Left),
            1 => Ok(MouseButton::Right),
            2 => Ok(MouseButton::Middle),
            3 => Ok(MouseButton::X1),
            4 => Ok(MouseButton::X2),
            other => Err(other),
        }
    }
}

/// One input event as it travels between host and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPacket {
    /// Layout version; written as [`PACKET_VERSION`], never branched on.
    pub version: u8,
    pub event_type: EventType,
    pub modifiers: ModifierFlags,
    pub data1: i32,
    pub data2: i32,
    /// Unix-epoch milliseconds at the moment the sender created the packet.
    pub timestamp_ms: i64,
    /// Monotonic per-sender counter; [`UNSEQUENCED`] opts out of ordering.
    pub sequence: u32,
}

impl InputPacket {
    /// Creates a packet stamped with the current time and no sequence number.
    pub fn new(event_type: EventType, data1: i32, data2: i32) -> Self {
        Self {
            version: PACKET_VERSION,
            event_type,
            modifiers: ModifierFlags::empty(),
            data1,
            data2,
            timestamp_ms: current_timestamp_ms(),
            sequence: UNSEQUENCED,
        }
    }

    pub fn key_down(virtual_key: i32) -> Self {
        Self::new(EventType::KeyDown, virtual_key, 0)
    }

    pub fn key_up(virtual_key: i32) -> Self {
        Self::new(EventType::KeyUp, virtual_key, 0)
    }

    pub fn mouse_move(dx: i32, dy: i32) -> Self {
        Self::new(EventType::MouseMove, dx, dy)
    }

    pub fn mouse_button(button: MouseButton, pressed: bool) -> Self {
        let event_type = if pressed {
            EventType::MouseButtonDown
        } else {
            EventType::MouseButtonUp
        };
        Self::new(event_type, button as i32, 0)
    }

    pub fn scroll(delta: i32) -> Self {
        Self::new(EventType::MouseScroll, delta, 0)
    }

    pub fn heartbeat(sequence: u32) -> Self {
        Self::new(EventType::Heartbeat, 0, 0).with_sequence(sequence)
    }

    /// Tells the peer which side now owns input. `remote == true` means the
    /// receiver of this packet is being driven by the sender.
    pub fn switch_notify(remote: bool) -> Self {
        Self::new(EventType::SwitchNotify, i32::from(remote), 0)
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierFlags) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_try_from_accepts_every_defined_value() {
        for value in [0u8, 1, 2, 3, 4, 5, 10, 20, 21, 30] {
            let parsed = EventType::try_from(value).expect("defined value must parse");
            assert_eq!(parsed as u8, value);
        }
    }

    #[test]
    fn test_event_type_try_from_rejects_gaps() {
        assert_eq!(EventType::try_from(6), Err(6));
        assert_eq!(EventType::try_from(11), Err(11));
        assert_eq!(EventType::try_from(255), Err(255));
    }

    #[test]
    fn test_keyboard_and_pointer_classification_is_disjoint() {
        assert!(EventType::KeyDown.is_keyboard());
        assert!(!EventType::KeyDown.is_pointer());
        assert!(EventType::MouseScroll.is_pointer());
        assert!(!EventType::Heartbeat.is_keyboard());
        assert!(!EventType::SwitchNotify.is_pointer());
    }

    #[test]
    fn test_mouse_button_packet_carries_button_id_in_data1() {
        // Arrange / Act
        let down = InputPacket::mouse_button(MouseButton::Middle, true);
        let up = InputPacket::mouse_button(MouseButton::Middle, false);

        // Assert
        assert_eq!(down.event_type, EventType::MouseButtonDown);
        assert_eq!(up.event_type, EventType::MouseButtonUp);
        assert_eq!(down.data1, 2);
        assert_eq!(MouseButton::try_from(down.data1), Ok(MouseButton::Middle));
    }

    #[test]
    fn test_switch_notify_encodes_mode_flag() {
        assert_eq!(InputPacket::switch_notify(true).data1, 1);
        assert_eq!(InputPacket::switch_notify(false).data1, 0);
        assert_eq!(InputPacket::switch_notify(true).sequence, UNSEQUENCED);
    }

    #[test]
    fn test_modifier_flags_helpers() {
        let flags = ModifierFlags(ModifierFlags::CTRL | ModifierFlags::WIN);
        assert!(flags.ctrl());
        assert!(flags.win());
        assert!(!flags.shift());
        assert!(!flags.alt());
    }
}
