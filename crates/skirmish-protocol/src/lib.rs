//! Wire protocol for Skirmish.
//!
//! This crate defines the bytes that clients and the server exchange:
//!
//! - **Types** ([`FrameHeader`], [`PacketId`], [`SessionId`], [`RoomId`]):
//!   the fixed 4-byte header and the identifiers carried in bodies.
//! - **Codec** ([`Request`], [`Response`], [`encode_frame`]): explicit
//!   little-endian encode/decode of every packet body.
//! - **Errors** ([`ProtocolError`]): what can be wrong with a packet.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw byte stream) and the
//! session (reassembly + commands). It knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Session (frames) → Protocol (Request) → Command
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Request, Response, RoomListEntry, SnapshotEntry, encode_frame, split_frame};
pub use error::ProtocolError;
pub use types::{
    CHAT_LEN, FrameHeader, HEADER_SIZE, MAX_FRAME_SIZE, MAX_ROOM_LIST_ENTRIES, PASSWORD_LEN, PacketId, RoomId, SessionId,
    TITLE_LEN, USERNAME_LEN,
};
