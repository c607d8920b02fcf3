//! Protocol module containing the input packet record, its binary codec, and
//! sequence numbering.

pub mod codec;
pub mod packet;
pub mod sequence;

pub use codec::{current_timestamp_ms, decode_packet, encode_packet, PacketError};
pub use packet::*;
pub use sequence::{SequenceCounter, SequenceWindow};
