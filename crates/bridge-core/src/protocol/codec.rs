//! Binary codec for [`InputPacket`].
//!
//! Wire format (little-endian, no padding):
//! ```text
//! [version:1][type:1][modifiers:2][data1:4][data2:4][timestamp_ms:8][sequence:4]
//! ```
//! Total size: 24 bytes. There are no variable-length fields, so encoding
//! never allocates and decoding is a handful of slice reads.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::protocol::packet::{EventType, InputPacket, ModifierFlags, PACKET_SIZE};

/// Errors that can occur while decoding a packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The byte slice is shorter than [`PACKET_SIZE`].
    #[error("malformed packet: need {needed} bytes, got {available}")]
    MalformedPacket { needed: usize, available: usize },

    /// The event type byte is not a recognized value.
    #[error("unknown event type: 0x{0:02X}")]
    UnknownEventType(u8),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `packet` into its fixed 24-byte representation.
///
/// # Examples
///
/// ```rust
/// use bridge_core::protocol::{decode_packet, encode_packet, InputPacket};
///
/// let packet = InputPacket::mouse_move(10, -5).with_sequence(7);
/// let bytes = encode_packet(&packet);
/// assert_eq!(bytes.len(), 24);
/// assert_eq!(decode_packet(&bytes).unwrap(), packet);
/// ```
pub fn encode_packet(packet: &InputPacket) -> [u8; PACKET_SIZE] {
    let mut buf = [0u8; PACKET_SIZE];
    buf[0] = packet.version;
    buf[1] = packet.event_type as u8;
    buf[2..4].copy_from_slice(&packet.modifiers.0.to_le_bytes());
    buf[4..8].copy_from_slice(&packet.data1.to_le_bytes());
    buf[8..12].copy_from_slice(&packet.data2.to_le_bytes());
    buf[12..20].copy_from_slice(&packet.timestamp_ms.to_le_bytes());
    buf[20..24].copy_from_slice(&packet.sequence.to_le_bytes());
    buf
}

/// Decodes the first 24 bytes of `bytes` into an [`InputPacket`].
///
/// Trailing bytes beyond [`PACKET_SIZE`] are ignored.
///
/// # Errors
///
/// - [`PacketError::MalformedPacket`] if fewer than 24 bytes are supplied.
/// - [`PacketError::UnknownEventType`] if byte 1 is not a known event type.
pub fn decode_packet(bytes: &[u8]) -> Result<InputPacket, PacketError> {
    if bytes.len() < PACKET_SIZE {
        return Err(PacketError::MalformedPacket {
            needed: PACKET_SIZE,
            available: bytes.len(),
        });
    }

    let event_type = EventType::try_from(bytes[1]).map_err(PacketError::UnknownEventType)?;

    Ok(InputPacket {
        version: bytes[0],
        event_type,
        modifiers: ModifierFlags(u16::from_le_bytes([bytes[2], bytes[3]])),
        data1: read_i32(bytes, 4),
        data2: read_i32(bytes, 8),
        timestamp_ms: i64::from_le_bytes([
            bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
        ]),
        sequence: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
    })
}

/// Returns the current wall-clock time as Unix-epoch milliseconds.
///
/// Falls back to 0 if the system clock is set before 1970.
pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
