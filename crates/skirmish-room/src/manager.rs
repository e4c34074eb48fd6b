//! Room manager: creates rooms, places players, steps the simulation.
//!
//! The registry (rooms, the session→room index and the id counter) sits
//! behind a single lock that every public method takes exactly once. Work
//! that reaches outside the registry, such as sending to sessions, happens
//! after the lock is released: methods hand back the member list and the
//! caller does the sending.
//!
//! Only the game loop mutates rooms. The lock exists because reads (room
//! listings, tests, shutdown) may come from other threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use skirmish_protocol::{Response, RoomId, SessionId, SnapshotEntry};
use skirmish_session::Session;

use crate::{Room, RoomConfig, RoomError};

/// What a [`RoomManager::join_room`] did.
#[derive(Debug)]
pub struct Joined {
    pub room_id: RoomId,
    /// The room did not exist and was created by this join.
    pub created: bool,
    /// The player's previous room, if joining moved them out of one.
    pub left: Option<Departure>,
}

/// A player leaving a room.
#[derive(Debug)]
pub struct Departure {
    pub room_id: RoomId,
    pub session_id: SessionId,
    /// Members still in the room, to be told about the departure.
    pub remaining: Vec<Arc<Session>>,
    /// The room became empty and was deleted.
    pub room_removed: bool,
}

/// One row of a room listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub title: String,
    pub user_count: usize,
}

/// A room's state at one tick, ready to broadcast.
#[derive(Debug)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub tick: u32,
    pub entries: Vec<SnapshotEntry>,
    pub members: Vec<Arc<Session>>,
}

impl RoomSnapshot {
    pub fn to_response(&self) -> Response {
        Response::Snapshot {
            tick: self.tick,
            entries: self.entries.clone(),
        }
    }
}

#[derive(Debug)]
struct Registry {
    rooms: BTreeMap<RoomId, Room>,
    index: HashMap<SessionId, RoomId>,
    next_id: i32,
}

impl Registry {
    /// Removes a player from whatever room the index says they are in.
    fn remove_player(&mut self, session_id: SessionId) -> Option<Departure> {
        let room_id = self.index.remove(&session_id)?;
        let room = self.rooms.get_mut(&room_id)?;
        if let Some(session) = room.remove(session_id) {
            session.set_room(None);
        }
        let remaining = room.members();
        let room_removed = room.is_empty();
        if room_removed {
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, "room removed (empty)");
        }
        Some(Departure {
            room_id,
            session_id,
            remaining,
            room_removed,
        })
    }

    fn next_free_id(&mut self) -> RoomId {
        loop {
            let id = RoomId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Owns every room and the session→room index.
#[derive(Debug)]
pub struct RoomManager {
    config: RoomConfig,
    inner: Mutex<Registry>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Registry {
                rooms: BTreeMap::new(),
                index: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates an empty room and returns its id.
    ///
    /// Ids come from a counter starting at 1; ids already taken by rooms
    /// that were created by entering them are skipped.
    pub fn create_room(&self, title: &str) -> RoomId {
        let mut reg = self.inner.lock();
        let id = reg.next_free_id();
        reg.rooms.insert(id, Room::new(id, title.to_string()));
        tracing::info!(room_id = %id, title, "room created");
        id
    }

    /// Creates a room and moves `session` into it in one step.
    ///
    /// The room never exists without its creator, so it is deleted like any
    /// other room once the last member leaves.
    ///
    /// # Errors
    /// Returns [`RoomError::SessionClosed`] if the session has disconnected.
    /// No room is created in that case.
    pub fn create_room_for(&self, session: &Arc<Session>, title: &str) -> Result<Joined, RoomError> {
        let session_id = session.id();
        let mut reg = self.inner.lock();
        if session.is_closed() {
            return Err(RoomError::SessionClosed(session_id));
        }

        let left = reg.remove_player(session_id);
        let room_id = reg.next_free_id();
        let mut room = Room::new(room_id, title.to_string());
        room.add(session);
        reg.rooms.insert(room_id, room);
        reg.index.insert(session_id, room_id);
        session.set_room(Some(room_id));

        tracing::info!(%session_id, %room_id, title, "room created by player");
        Ok(Joined {
            room_id,
            created: true,
            left,
        })
    }

    /// Puts a session into `room_id`, creating the room if needed.
    ///
    /// A player already in another room is moved out of it first (see
    /// [`Joined::left`]). Joining the room one is already in changes
    /// nothing.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] if the room is at `max_players`. The player
    ///   stays where they were.
    /// - [`RoomError::SessionClosed`] if the session has disconnected.
    pub fn join_room(&self, session: &Arc<Session>, room_id: RoomId) -> Result<Joined, RoomError> {
        let session_id = session.id();
        let mut reg = self.inner.lock();

        if session.is_closed() {
            return Err(RoomError::SessionClosed(session_id));
        }
        if reg.index.get(&session_id) == Some(&room_id) {
            return Ok(Joined {
                room_id,
                created: false,
                left: None,
            });
        }
        if let Some(room) = reg.rooms.get(&room_id) {
            if room.len() >= self.config.max_players {
                return Err(RoomError::RoomFull(room_id));
            }
        }

        let left = reg.remove_player(session_id);

        let created = !reg.rooms.contains_key(&room_id);
        if created {
            let title = format!("{} {}", self.config.default_title, room_id.0);
            reg.rooms.insert(room_id, Room::new(room_id, title));
            tracing::info!(%room_id, "room created on enter");
        }
        if let Some(room) = reg.rooms.get_mut(&room_id) {
            room.add(session);
        }
        reg.index.insert(session_id, room_id);
        session.set_room(Some(room_id));

        tracing::info!(%session_id, %room_id, "player joined room");
        Ok(Joined {
            room_id,
            created,
            left,
        })
    }

    /// Takes a player out of their room. Deletes the room if it empties.
    ///
    /// Returns `None` if the player was not in a room.
    pub fn remove_player_from_current_room(&self, session_id: SessionId) -> Option<Departure> {
        let departure = self.inner.lock().remove_player(session_id);
        if let Some(d) = &departure {
            tracing::info!(%session_id, room_id = %d.room_id, "player left room");
        }
        departure
    }

    pub fn room_of(&self, session_id: SessionId) -> Option<RoomId> {
        self.inner.lock().index.get(&session_id).copied()
    }

    /// Overwrites a player's velocity. Returns `false` if they are not in a
    /// room.
    pub fn set_velocity(&self, session_id: SessionId, vx: f32, vy: f32) -> bool {
        let mut reg = self.inner.lock();
        let Some(room_id) = reg.index.get(&session_id).copied() else {
            return false;
        };
        match reg
            .rooms
            .get_mut(&room_id)
            .and_then(|room| room.player_mut(session_id))
        {
            Some(player) => {
                player.vx = vx;
                player.vy = vy;
                true
            }
            None => false,
        }
    }

    /// A player's position, if they are in a room.
    pub fn position(&self, session_id: SessionId) -> Option<(f32, f32)> {
        let reg = self.inner.lock();
        let room_id = reg.index.get(&session_id)?;
        let player = reg.rooms.get(room_id)?.player(session_id)?;
        Some((player.x, player.y))
    }

    /// Sessions currently in `room_id` (empty if the room does not exist).
    pub fn members(&self, room_id: RoomId) -> Vec<Arc<Session>> {
        self.inner
            .lock()
            .rooms
            .get(&room_id)
            .map(Room::members)
            .unwrap_or_default()
    }

    /// Every room, ordered by id.
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        self.inner
            .lock()
            .rooms
            .values()
            .map(|room| RoomSummary {
                room_id: room.id(),
                title: room.title().to_string(),
                user_count: room.len(),
            })
            .collect()
    }

    /// Advances every player in every room by `dt` seconds.
    pub fn update_all(&self, dt: f32) {
        for room in self.inner.lock().rooms.values_mut() {
            room.update(dt);
        }
    }

    /// Collects a snapshot of each room for `tick`.
    pub fn snapshots(&self, tick: u32) -> Vec<RoomSnapshot> {
        self.inner
            .lock()
            .rooms
            .values()
            .map(|room| RoomSnapshot {
                room_id: room.id(),
                tick,
                entries: room.snapshot_entries(),
                members: room.members(),
            })
            .collect()
    }

    /// Sends each room's snapshot to its members. Returns frames queued.
    pub fn broadcast_snapshots(&self, tick: u32) -> usize {
        let mut queued = 0;
        for snapshot in self.snapshots(tick) {
            queued += broadcast(&snapshot.members, &snapshot.to_response());
        }
        queued
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.inner.lock().index.len()
    }
}

/// Queues `response` on every open session in `members`. Returns how many
/// it was queued on.
pub fn broadcast(members: &[Arc<Session>], response: &Response) -> usize {
    let body = response.encode_body();
    let packet_id = response.packet_id();
    members
        .iter()
        .filter(|session| !session.is_closed())
        .filter(|session| match session.enqueue_outbound(packet_id, &body) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(session_id = %session.id(), error = %e, "broadcast dropped");
                false
            }
        })
        .count()
}
