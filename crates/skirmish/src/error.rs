//! Unified error type for the Skirmish server.

use skirmish_persistence::PersistenceError;
use skirmish_protocol::ProtocolError;
use skirmish_room::RoomError;
use skirmish_session::SessionError;
use skirmish_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Per-connection problems never get this far: the reactor handles them by
/// disconnecting the session. What remains are start-up failures (bind,
/// config, database) and the occasional error a caller wants to bubble up
/// with `?`.
#[derive(Debug, thiserror::Error)]
pub enum SkirmishError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Runtime or thread start-up failed, or a config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use skirmish_persistence::DbError;
    use skirmish_protocol::{PacketId, RoomId, SessionId};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: SkirmishError = TransportError::BindFailed(io).into();
        assert!(matches!(err, SkirmishError::Transport(_)));
        assert!(err.to_string().contains("taken"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: SkirmishError = ProtocolError::BodyTooShort {
            packet: PacketId::Move,
            expected: 8,
            actual: 3,
        }
        .into();
        assert!(matches!(err, SkirmishError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: SkirmishError = SessionError::Framing { declared: 2 }.into();
        assert!(matches!(err, SkirmishError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: SkirmishError = RoomError::SessionClosed(SessionId(1)).into();
        assert!(matches!(err, SkirmishError::Room(_)));
        let err: SkirmishError = RoomError::RoomFull(RoomId(7)).into();
        assert!(err.to_string().contains("R-7"));
    }

    #[test]
    fn test_from_persistence_error() {
        let err: SkirmishError =
            PersistenceError::from(DbError::Connection("down".into())).into();
        assert!(matches!(err, SkirmishError::Persistence(_)));
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: SkirmishError = json_err.into();
        assert!(matches!(err, SkirmishError::Config(_)));
    }
}
