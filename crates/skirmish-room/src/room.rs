//! A single room: its players' state and the sessions to reach them.

use std::collections::HashMap;
use std::sync::Arc;

use skirmish_protocol::{RoomId, SessionId, SnapshotEntry};
use skirmish_session::Session;

use crate::PlayerState;

/// One room. Lives inside the [`RoomManager`](crate::RoomManager) registry.
///
/// `players` and `members` always have the same key set: every player has a
/// session to send to, and every member has simulated state.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    title: String,
    players: HashMap<SessionId, PlayerState>,
    members: HashMap<SessionId, Arc<Session>>,
}

impl Room {
    pub(crate) fn new(id: RoomId, title: String) -> Self {
        Self {
            id,
            title,
            players: HashMap::new(),
            members: HashMap::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.players.contains_key(&session_id)
    }

    pub fn player(&self, session_id: SessionId) -> Option<&PlayerState> {
        self.players.get(&session_id)
    }

    pub(crate) fn player_mut(&mut self, session_id: SessionId) -> Option<&mut PlayerState> {
        self.players.get_mut(&session_id)
    }

    pub(crate) fn add(&mut self, session: &Arc<Session>) {
        let id = session.id();
        self.players
            .insert(id, PlayerState::new(id, session.name(), self.id));
        self.members.insert(id, Arc::clone(session));
    }

    pub(crate) fn remove(&mut self, session_id: SessionId) -> Option<Arc<Session>> {
        self.players.remove(&session_id);
        self.members.remove(&session_id)
    }

    pub fn members(&self) -> Vec<Arc<Session>> {
        self.members.values().cloned().collect()
    }

    /// Advances every player by one fixed step.
    pub(crate) fn update(&mut self, dt: f32) {
        for player in self.players.values_mut() {
            player.integrate(dt);
        }
    }

    /// Positions of every player, ordered by session id.
    pub fn snapshot_entries(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<_> = self.players.values().map(PlayerState::snapshot).collect();
        entries.sort_by_key(|e| e.session_id);
        entries
    }
}
