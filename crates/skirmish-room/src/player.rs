//! Authoritative per-player simulation state.

use skirmish_protocol::{RoomId, SessionId, SnapshotEntry};

/// A player's state inside a room. Owned by the room.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub session_id: SessionId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub room_id: RoomId,
}

impl PlayerState {
    /// A player at the origin, standing still.
    pub fn new(session_id: SessionId, name: impl Into<String>, room_id: RoomId) -> Self {
        Self {
            session_id,
            name: name.into(),
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            room_id,
        }
    }

    /// Advances position by one fixed step.
    pub fn integrate(&mut self, dt: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
    }

    pub fn snapshot(&self) -> SnapshotEntry {
        SnapshotEntry {
            session_id: self.session_id,
            x: self.x,
            y: self.y,
        }
    }
}
