//! Identity types, packet ids and the frame header.
//!
//! Every packet on the wire starts with the same 4-byte header:
//!
//! ```text
//! +----------------+----------------+-------------------------+
//! | total_size u16 | packet_id u16  | body (total_size - 4)   |
//! +----------------+----------------+-------------------------+
//! ```
//!
//! Both header fields are little-endian. `total_size` counts the header
//! itself, so an empty-bodied packet has `total_size == 4`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest frame the 16-bit size field can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Fixed width of the username field in Register/Login.
pub const USERNAME_LEN: usize = 50;

/// Fixed width of the password field in Register/Login.
pub const PASSWORD_LEN: usize = 50;

/// Fixed width of a room title.
pub const TITLE_LEN: usize = 32;

/// Maximum chat text length in bytes.
pub const CHAT_LEN: usize = 256;

/// Most rooms one `RoomListRes` frame can carry: a 4-byte count, then
/// 40 bytes per room (id, user count, title).
pub const MAX_ROOM_LIST_ENTRIES: usize = (MAX_FRAME_SIZE - HEADER_SIZE - 4) / (8 + TITLE_LEN);

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier the server assigns to a connection on accept.
///
/// Newtype over `u32` so it can't be mixed up with a room id or a database
/// user id, which are all plain integers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identifier of a room. Signed because the wire format carries it as `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PacketId
// ---------------------------------------------------------------------------

/// The discriminant carried in every frame header.
///
/// Numbering is shared with deployed clients and must never be reordered.
/// Some ids are used in both directions with different bodies
/// (`EnterRoom`, `LeaveRoom`, `Chat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketId {
    RegisterReq = 1,
    RegisterRes = 2,
    LoginReq = 3,
    LoginRes = 4,
    EnterRoom = 5,
    LeaveRoom = 6,
    Chat = 7,
    Move = 8,
    Snapshot = 9,
    RoomListReq = 10,
    RoomListRes = 11,
    CreateRoomReq = 12,
    CreateRoomRes = 13,
    LogoutReq = 14,
}

impl PacketId {
    /// Maps a raw discriminant to a packet id.
    pub fn from_u16(raw: u16) -> Option<Self> {
        let id = match raw {
            1 => Self::RegisterReq,
            2 => Self::RegisterRes,
            3 => Self::LoginReq,
            4 => Self::LoginRes,
            5 => Self::EnterRoom,
            6 => Self::LeaveRoom,
            7 => Self::Chat,
            8 => Self::Move,
            9 => Self::Snapshot,
            10 => Self::RoomListReq,
            11 => Self::RoomListRes,
            12 => Self::CreateRoomReq,
            13 => Self::CreateRoomRes,
            14 => Self::LogoutReq,
            _ => return None,
        };
        Some(id)
    }

    /// The raw discriminant written into the header.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Minimum body length of the client→server form of this packet.
    ///
    /// Returns `None` for ids the server never accepts from a client.
    pub fn min_request_body(self) -> Option<usize> {
        match self {
            Self::RegisterReq | Self::LoginReq => Some(USERNAME_LEN + PASSWORD_LEN),
            Self::EnterRoom => Some(4),
            Self::Move => Some(8),
            Self::CreateRoomReq => Some(TITLE_LEN),
            Self::LeaveRoom | Self::Chat | Self::RoomListReq | Self::LogoutReq => Some(0),
            Self::RegisterRes
            | Self::LoginRes
            | Self::Snapshot
            | Self::RoomListRes
            | Self::CreateRoomRes => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameHeader
// ---------------------------------------------------------------------------

/// The decoded 4-byte header at the front of every frame.
///
/// The packet id stays a raw `u16` here: framing has to work even for ids
/// this build does not know, so the stream can be skipped or rejected
/// without misreading the next packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Size of the whole frame, header included.
    pub total_size: u16,
    /// Raw discriminant.
    pub packet_id: u16,
}

impl FrameHeader {
    /// Reads a header from the start of `buf`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let bytes = buf.get(..HEADER_SIZE)?;
        Some(Self {
            total_size: u16::from_le_bytes([bytes[0], bytes[1]]),
            packet_id: u16::from_le_bytes([bytes[2], bytes[3]]),
        })
    }

    /// Serializes the header into its 4-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let size = self.total_size.to_le_bytes();
        let id = self.packet_id.to_le_bytes();
        [size[0], size[1], id[0], id[1]]
    }

    /// Frame size as a `usize`.
    pub fn total_len(&self) -> usize {
        usize::from(self.total_size)
    }

    /// Body length implied by the header (0 if the header is malformed).
    pub fn body_len(&self) -> usize {
        self.total_len().saturating_sub(HEADER_SIZE)
    }

    /// The known packet id, if any.
    pub fn packet(&self) -> Option<PacketId> {
        PacketId::from_u16(self.packet_id)
    }
}
