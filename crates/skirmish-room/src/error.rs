//! Error types for the room layer.

use skirmish_protocol::{RoomId, SessionId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room already holds `max_players` players.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The session was closed before it could be placed in a room.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
}
