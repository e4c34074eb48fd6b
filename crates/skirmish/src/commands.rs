//! Command execution: what each client request does to the world.
//!
//! Everything here runs on the game-logic thread, one command at a time, in
//! the order the commands were queued. That thread is the only writer of
//! room and player state, so no command has to think about another command
//! running at the same time.
//!
//! ```text
//!   Command ──▶ execute ──┬──▶ RoomManager        (join, leave, move)
//!                         ├──▶ PersistenceGateway (auth, presence, chat)
//!                         └──▶ Session::send      (replies, broadcasts)
//! ```
//!
//! Requests that make no sense in the session's current state (chat outside
//! a room, a second login) are dropped or answered with a failure and
//! logged at debug. They never disconnect the client.

use std::sync::Arc;

use skirmish_persistence::{PersistenceGateway, PersistenceRequest, PersistenceSink, chat_line};
use skirmish_protocol::{MAX_ROOM_LIST_ENTRIES, Response, RoomId, RoomListEntry, SessionId};
use skirmish_room::{Departure, RoomError, RoomManager, broadcast};
use skirmish_session::{Command, Session, SessionDirectory};

/// Sender id carried by replayed history lines.
pub const HISTORY_SENDER: u32 = 0;

/// The state commands act on.
#[derive(Clone)]
pub struct GameContext {
    pub rooms: Arc<RoomManager>,
    pub persistence: Arc<PersistenceGateway>,
    pub directory: Arc<SessionDirectory>,
}

/// Runs one command to completion.
pub fn execute(command: Command, ctx: &GameContext) {
    tracing::trace!(session_id = %command.session_id(), kind = command.kind(), "executing command");
    match command {
        Command::Register {
            session_id,
            username,
            password,
        } => register(ctx, session_id, username, password),
        Command::Login {
            session_id,
            username,
            password,
        } => login(ctx, session_id, &username, &password),
        Command::EnterRoom {
            session_id,
            room_id,
        } => enter_room(ctx, session_id, room_id),
        Command::LeaveRoom { session_id } => {
            if let Some(departure) = ctx.rooms.remove_player_from_current_room(session_id) {
                announce_departure(&departure);
            } else {
                tracing::debug!(%session_id, "leave ignored: not in a room");
            }
        }
        Command::Move { session_id, vx, vy } => {
            if !ctx.rooms.set_velocity(session_id, vx, vy) {
                tracing::debug!(%session_id, "move ignored: not in a room");
            }
        }
        Command::Chat {
            session_id,
            message,
        } => chat(ctx, session_id, message),
        Command::CreateRoom { session_id, title } => create_room(ctx, session_id, &title),
        Command::ListRooms { session_id } => list_rooms(ctx, session_id),
        Command::Logout {
            session_id,
            username,
        } => logout(ctx, session_id, username),
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn register(ctx: &GameContext, session_id: SessionId, username: String, password: String) {
    let request = PersistenceRequest::Register {
        session_id,
        username,
        password,
    };
    if !ctx.persistence.post_async(request) {
        reply(ctx, session_id, &Response::RegisterResult { success: false });
    }
}

fn login(ctx: &GameContext, session_id: SessionId, username: &str, password: &str) {
    let Some(session) = ctx.directory.get(session_id) else {
        tracing::debug!(%session_id, "login ignored: session gone");
        return;
    };
    let failed = Response::LoginResult {
        success: false,
        user_id: 0,
    };

    if session.is_logged_in() {
        tracing::debug!(%session_id, user = username, "login rejected: already logged in");
        send(&session, &failed);
        return;
    }
    let Some(user_id) = ctx.persistence.authenticate(username, password) else {
        tracing::info!(%session_id, user = username, "login rejected: bad credentials");
        send(&session, &failed);
        return;
    };
    if !ctx.persistence.check_and_register_presence(username) {
        tracing::info!(%session_id, user = username, "login rejected: already online");
        send(&session, &failed);
        return;
    }

    session.bind_login(username);
    // A disconnect that raced the login saw no username and queued no
    // Logout, so the presence entry is ours to release.
    if session.is_closed() {
        if let Some(name) = session.logout() {
            ctx.persistence.remove_presence(&name);
        }
        return;
    }

    tracing::info!(%session_id, user = username, user_id, "login succeeded");
    send(
        &session,
        &Response::LoginResult {
            success: true,
            user_id,
        },
    );
}

fn logout(ctx: &GameContext, session_id: SessionId, username: Option<String>) {
    let session = ctx.directory.remove(session_id);
    // A client-sent Logout carries no name; take it from the session.
    let username = username.or_else(|| session.as_ref().and_then(|s| s.logout()));

    if let Some(departure) = ctx.rooms.remove_player_from_current_room(session_id) {
        announce_departure(&departure);
    }
    if let Some(name) = &username {
        ctx.persistence.remove_presence(name);
    }
    if let Some(session) = session {
        session.disconnect();
    }
    tracing::info!(%session_id, user = ?username, "logged out");
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

fn enter_room(ctx: &GameContext, session_id: SessionId, room_id: RoomId) {
    let Some(session) = ctx.directory.get(session_id) else {
        tracing::debug!(%session_id, "enter ignored: session gone");
        return;
    };
    let failed = Response::EnterRoomResult {
        success: false,
        room_id,
    };
    if !session.is_logged_in() {
        tracing::debug!(%session_id, %room_id, "enter rejected: not logged in");
        send(&session, &failed);
        return;
    }

    match ctx.rooms.join_room(&session, room_id) {
        Ok(joined) => {
            if let Some(departure) = &joined.left {
                announce_departure(departure);
            }
            send(
                &session,
                &Response::EnterRoomResult {
                    success: true,
                    room_id,
                },
            );
            replay_history(ctx, &session, room_id);
        }
        Err(RoomError::RoomFull(_)) => {
            tracing::info!(%session_id, %room_id, "enter rejected: room full");
            send(&session, &failed);
        }
        Err(e) => tracing::debug!(%session_id, %room_id, error = %e, "enter ignored"),
    }
}

fn replay_history(ctx: &GameContext, session: &Session, room_id: RoomId) {
    // The cache keeps newest first; clients expect reading order.
    for text in ctx.persistence.recent_chat(room_id).into_iter().rev() {
        send(
            session,
            &Response::ChatBroadcast {
                sender_id: HISTORY_SENDER,
                text,
            },
        );
    }
}

fn create_room(ctx: &GameContext, session_id: SessionId, title: &str) {
    let Some(session) = ctx.directory.get(session_id) else {
        return;
    };
    if !session.is_logged_in() {
        tracing::debug!(%session_id, "create room rejected: not logged in");
        send(
            &session,
            &Response::CreateRoomResult {
                success: false,
                room_id: RoomId(0),
            },
        );
        return;
    }

    let title = if title.is_empty() {
        ctx.rooms.config().default_title.as_str()
    } else {
        title
    };
    match ctx.rooms.create_room_for(&session, title) {
        Ok(joined) => {
            if let Some(departure) = &joined.left {
                announce_departure(departure);
            }
            send(
                &session,
                &Response::CreateRoomResult {
                    success: true,
                    room_id: joined.room_id,
                },
            );
        }
        Err(e) => tracing::debug!(%session_id, error = %e, "create room ignored"),
    }
}

fn list_rooms(ctx: &GameContext, session_id: SessionId) {
    let rooms = ctx
        .rooms
        .list_rooms()
        .into_iter()
        .take(MAX_ROOM_LIST_ENTRIES)
        .map(|summary| RoomListEntry {
            room_id: summary.room_id,
            user_count: i32::try_from(summary.user_count).unwrap_or(i32::MAX),
            title: summary.title,
        })
        .collect();
    reply(ctx, session_id, &Response::RoomList { rooms });
}

fn announce_departure(departure: &Departure) {
    let notice = Response::PlayerLeft {
        session_id: departure.session_id,
    };
    broadcast(&departure.remaining, &notice);
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

fn chat(ctx: &GameContext, session_id: SessionId, message: String) {
    let Some(room_id) = ctx.rooms.room_of(session_id) else {
        tracing::debug!(%session_id, "chat dropped: not in a room");
        return;
    };
    let Some(session) = ctx.directory.get(session_id) else {
        return;
    };
    let username = session.name();

    let line = Response::ChatBroadcast {
        sender_id: session_id.0,
        text: chat_line(&username, &message),
    };
    let delivered = broadcast(&ctx.rooms.members(room_id), &line);
    tracing::debug!(%session_id, %room_id, delivered, "chat broadcast");

    ctx.persistence.cache_chat(room_id, &username, &message);
    ctx.persistence.post_async(PersistenceRequest::SaveChat {
        session_id,
        username,
        message,
        room_id,
    });
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

fn send(session: &Session, response: &Response) {
    if let Err(e) = session.send(response) {
        tracing::debug!(session_id = %session.id(), error = %e, "reply dropped");
    }
}

fn reply(ctx: &GameContext, session_id: SessionId, response: &Response) {
    match ctx.directory.get(session_id) {
        Some(session) => send(&session, response),
        None => tracing::debug!(%session_id, "reply dropped: session gone"),
    }
}

/// Delivers registration results from persistence workers to the waiting
/// client.
pub struct DirectorySink {
    directory: Arc<SessionDirectory>,
}

impl DirectorySink {
    pub fn new(directory: Arc<SessionDirectory>) -> Self {
        Self { directory }
    }
}

impl PersistenceSink for DirectorySink {
    fn register_completed(&self, session_id: SessionId, success: bool) {
        match self.directory.get(session_id) {
            Some(session) => send(&session, &Response::RegisterResult { success }),
            None => tracing::debug!(%session_id, success, "register result dropped: session gone"),
        }
    }
}
