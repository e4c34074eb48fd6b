//! Commands: decoded client intents waiting for the game loop.
//!
//! A [`Command`] is a [`Request`] tagged with the session that sent it.
//! Sessions and reactor threads push commands into the queue; the game loop
//! is the only consumer and executes them in arrival order.

use crossbeam_channel::{Receiver, Sender, unbounded};
use skirmish_protocol::{Request, RoomId, SessionId};

/// Producer side of the command queue.
pub type CommandSender = Sender<Command>;

/// Consumer side of the command queue (held by the game loop).
pub type CommandReceiver = Receiver<Command>;

/// Creates the unbounded multi-producer command queue.
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    unbounded()
}

/// One unit of work for the game loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Register {
        session_id: SessionId,
        username: String,
        password: String,
    },
    Login {
        session_id: SessionId,
        username: String,
        password: String,
    },
    EnterRoom {
        session_id: SessionId,
        room_id: RoomId,
    },
    LeaveRoom {
        session_id: SessionId,
    },
    Move {
        session_id: SessionId,
        vx: f32,
        vy: f32,
    },
    Chat {
        session_id: SessionId,
        message: String,
    },
    CreateRoom {
        session_id: SessionId,
        title: String,
    },
    ListRooms {
        session_id: SessionId,
    },
    /// Explicit logout, or one synthesized when a logged-in session drops.
    ///
    /// A synthesized logout carries the username because the session may
    /// already be gone from the directory when the command executes.
    Logout {
        session_id: SessionId,
        username: Option<String>,
    },
}

impl Command {
    /// Tags a decoded request with the session it came from.
    pub fn from_request(session_id: SessionId, request: Request) -> Self {
        match request {
            Request::Register { username, password } => Self::Register {
                session_id,
                username,
                password,
            },
            Request::Login { username, password } => Self::Login {
                session_id,
                username,
                password,
            },
            Request::EnterRoom { room_id } => Self::EnterRoom { session_id, room_id },
            Request::LeaveRoom => Self::LeaveRoom { session_id },
            Request::Move { vx, vy } => Self::Move { session_id, vx, vy },
            Request::Chat { message } => Self::Chat { session_id, message },
            Request::CreateRoom { title } => Self::CreateRoom { session_id, title },
            Request::ListRooms => Self::ListRooms { session_id },
            Request::Logout => Self::Logout {
                session_id,
                username: None,
            },
        }
    }

    /// The session that issued this command.
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Register { session_id, .. }
            | Self::Login { session_id, .. }
            | Self::EnterRoom { session_id, .. }
            | Self::LeaveRoom { session_id }
            | Self::Move { session_id, .. }
            | Self::Chat { session_id, .. }
            | Self::CreateRoom { session_id, .. }
            | Self::ListRooms { session_id }
            | Self::Logout { session_id, .. } => *session_id,
        }
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::EnterRoom { .. } => "enter_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Move { .. } => "move",
            Self::Chat { .. } => "chat",
            Self::CreateRoom { .. } => "create_room",
            Self::ListRooms { .. } => "list_rooms",
            Self::Logout { .. } => "logout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_keeps_payload_and_session() {
        let cmd = Command::from_request(SessionId(4), Request::Move { vx: 1.5, vy: -2.0 });
        assert_eq!(
            cmd,
            Command::Move {
                session_id: SessionId(4),
                vx: 1.5,
                vy: -2.0
            }
        );
        assert_eq!(cmd.session_id(), SessionId(4));
        assert_eq!(cmd.kind(), "move");
    }

    #[test]
    fn test_explicit_logout_has_no_username() {
        let cmd = Command::from_request(SessionId(1), Request::Logout);
        assert_eq!(
            cmd,
            Command::Logout {
                session_id: SessionId(1),
                username: None
            }
        );
    }
}
