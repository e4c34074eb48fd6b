//! Error types for the protocol layer.
//!
//! Each crate in Skirmish defines its own error enum. A `ProtocolError`
//! always means the bytes themselves were wrong: an id nobody knows, a body
//! too short for its packet, or a frame that cannot fit in a `u16` header.

use crate::PacketId;

/// Errors that can occur while decoding or encoding packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The discriminant in the header does not name a known request.
    #[error("unknown packet id {0}")]
    UnknownPacket(u16),

    /// The body is shorter than the fixed layout of its packet.
    #[error("{packet:?} body too short: expected at least {expected} bytes, got {actual}")]
    BodyTooShort {
        /// Which packet was being decoded.
        packet: PacketId,
        /// Minimum body length for this packet.
        expected: usize,
        /// Body length that actually arrived.
        actual: usize,
    },

    /// The header declares a size that no valid frame can have.
    #[error("invalid frame size {0}")]
    InvalidSize(usize),

    /// A frame would not fit in the 16-bit size field.
    #[error("frame of {0} bytes exceeds the 65535-byte limit")]
    FrameTooLarge(usize),
}
