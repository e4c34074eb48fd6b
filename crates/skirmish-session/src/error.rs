//! Error types for the session layer.
//!
//! Every variant here is fatal for the connection it came from: the reactor
//! answers any of them by disconnecting the session.

use skirmish_protocol::ProtocolError;

/// Errors that can occur while a session handles its byte streams.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A receive delivered more bytes than the buffer can hold.
    #[error("receive buffer overflow: {needed} bytes arrived with {free} free")]
    BufferOverflow { needed: usize, free: usize },

    /// The packet at the read cursor declares an impossible size.
    #[error("framing error: packet declares {declared} bytes")]
    Framing { declared: usize },

    /// A complete packet could not be decoded.
    #[error(transparent)]
    Malformed(#[from] MalformedPacket),

    /// An outbound frame could not be built.
    #[error("cannot frame outbound packet: {0}")]
    Protocol(#[from] ProtocolError),

    /// The command queue has no consumer any more (server shutting down).
    #[error("command queue closed")]
    QueueClosed,
}

/// A complete packet whose body did not decode.
///
/// The receive buffer is left positioned at the start of this packet, so
/// the caller can either skip it or drop the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed packet id {packet_id} ({size} bytes): {error}")]
pub struct MalformedPacket {
    /// Raw discriminant from the header.
    pub packet_id: u16,
    /// Declared frame size, header included.
    pub size: usize,
    /// What was wrong with it.
    #[source]
    pub error: ProtocolError,
}
