//! Rooms for Skirmish.
//!
//! A room groups players who see each other: they share snapshots and chat.
//! The [`RoomManager`] owns every room and every [`PlayerState`], and keeps
//! an index from session to room so a player is in at most one room.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms, places and removes players, steps the
//!   simulation, collects snapshots
//! - [`Room`]: one room's players and member sessions
//! - [`PlayerState`]: authoritative position and velocity
//! - [`RoomConfig`]: capacity and default titles
//!
//! Sessions store only the [`RoomId`](skirmish_protocol::RoomId) of their
//! room; the manager is the single owner of room state.

mod config;
mod error;
mod manager;
mod player;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use manager::{Departure, Joined, RoomManager, RoomSnapshot, RoomSummary, broadcast};
pub use player::PlayerState;
pub use room::Room;
