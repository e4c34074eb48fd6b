//! Packet body codecs.
//!
//! Bodies are fixed little-endian layouts. Every field is read and written
//! through `from_le_bytes` / `to_le_bytes` on bounds-checked slices; nothing
//! here reinterprets a byte buffer as a struct.
//!
//! - [`Request`] is what a client sends. The server only ever decodes these.
//! - [`Response`] is what the server sends. The server encodes them; clients
//!   (and the integration tests) decode them.

use crate::{
    CHAT_LEN, FrameHeader, HEADER_SIZE, MAX_FRAME_SIZE, PASSWORD_LEN, PacketId, ProtocolError,
    RoomId, SessionId, TITLE_LEN, USERNAME_LEN,
};

// ---------------------------------------------------------------------------
// Requests (client → server)
// ---------------------------------------------------------------------------

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Create an account.
    Register { username: String, password: String },
    /// Authenticate this connection.
    Login { username: String, password: String },
    /// Join (or create) a room by id.
    EnterRoom { room_id: RoomId },
    /// Leave the current room.
    LeaveRoom,
    /// Set the player's velocity.
    Move { vx: f32, vy: f32 },
    /// Say something in the current room.
    Chat { message: String },
    /// Create a new room with a title.
    CreateRoom { title: String },
    /// Ask for the room list.
    ListRooms,
    /// End the session.
    Logout,
}

impl Request {
    /// Decodes a request body for the given raw discriminant.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownPacket`] if `packet_id` is not a
    ///   client→server packet.
    /// - [`ProtocolError::BodyTooShort`] if the body is shorter than the
    ///   packet's fixed layout.
    pub fn decode(packet_id: u16, body: &[u8]) -> Result<Self, ProtocolError> {
        let packet = PacketId::from_u16(packet_id).ok_or(ProtocolError::UnknownPacket(packet_id))?;
        let expected = packet
            .min_request_body()
            .ok_or(ProtocolError::UnknownPacket(packet_id))?;
        if body.len() < expected {
            return Err(ProtocolError::BodyTooShort {
                packet,
                expected,
                actual: body.len(),
            });
        }

        let mut r = Reader::new(body);
        let request = match packet {
            PacketId::RegisterReq => Self::Register {
                username: r.fixed_str(USERNAME_LEN),
                password: r.fixed_str(PASSWORD_LEN),
            },
            PacketId::LoginReq => Self::Login {
                username: r.fixed_str(USERNAME_LEN),
                password: r.fixed_str(PASSWORD_LEN),
            },
            PacketId::EnterRoom => Self::EnterRoom {
                room_id: RoomId(r.i32()),
            },
            PacketId::LeaveRoom => Self::LeaveRoom,
            PacketId::Move => Self::Move {
                vx: r.f32(),
                vy: r.f32(),
            },
            PacketId::Chat => Self::Chat {
                message: r.fixed_str(CHAT_LEN.min(body.len())),
            },
            PacketId::CreateRoomReq => Self::CreateRoom {
                title: r.fixed_str(TITLE_LEN),
            },
            PacketId::RoomListReq => Self::ListRooms,
            PacketId::LogoutReq => Self::Logout,
            // min_request_body() already rejected server→client ids.
            _ => return Err(ProtocolError::UnknownPacket(packet_id)),
        };
        Ok(request)
    }

    /// The discriminant this request travels under.
    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::Register { .. } => PacketId::RegisterReq,
            Self::Login { .. } => PacketId::LoginReq,
            Self::EnterRoom { .. } => PacketId::EnterRoom,
            Self::LeaveRoom => PacketId::LeaveRoom,
            Self::Move { .. } => PacketId::Move,
            Self::Chat { .. } => PacketId::Chat,
            Self::CreateRoom { .. } => PacketId::CreateRoomReq,
            Self::ListRooms => PacketId::RoomListReq,
            Self::Logout => PacketId::LogoutReq,
        }
    }

    /// Encodes the request body (client side).
    pub fn encode_body(&self) -> Vec<u8> {
        let mut w = Writer::default();
        match self {
            Self::Register { username, password } | Self::Login { username, password } => {
                w.fixed_str(username, USERNAME_LEN);
                w.fixed_str(password, PASSWORD_LEN);
            }
            Self::EnterRoom { room_id } => w.i32(room_id.0),
            Self::Move { vx, vy } => {
                w.f32(*vx);
                w.f32(*vy);
            }
            Self::Chat { message } => w.bounded_str(message, CHAT_LEN),
            Self::CreateRoom { title } => w.fixed_str(title, TITLE_LEN),
            Self::LeaveRoom | Self::ListRooms | Self::Logout => {}
        }
        w.into_inner()
    }

    /// Encodes the full frame, header included (client side).
    pub fn encode_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.packet_id(), &self.encode_body())
    }
}

// ---------------------------------------------------------------------------
// Responses (server → client)
// ---------------------------------------------------------------------------

/// One row of a room listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub user_count: i32,
    pub title: String,
}

/// One player's authoritative position in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotEntry {
    pub session_id: SessionId,
    pub x: f32,
    pub y: f32,
}

/// A message the server sends to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    RegisterResult { success: bool },
    LoginResult { success: bool, user_id: u32 },
    EnterRoomResult { success: bool, room_id: RoomId },
    /// Another member left the room.
    PlayerLeft { session_id: SessionId },
    ChatBroadcast { sender_id: u32, text: String },
    Snapshot { tick: u32, entries: Vec<SnapshotEntry> },
    RoomList { rooms: Vec<RoomListEntry> },
    CreateRoomResult { success: bool, room_id: RoomId },
}

impl Response {
    /// The discriminant this response travels under.
    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::RegisterResult { .. } => PacketId::RegisterRes,
            Self::LoginResult { .. } => PacketId::LoginRes,
            Self::EnterRoomResult { .. } => PacketId::EnterRoom,
            Self::PlayerLeft { .. } => PacketId::LeaveRoom,
            Self::ChatBroadcast { .. } => PacketId::Chat,
            Self::Snapshot { .. } => PacketId::Snapshot,
            Self::RoomList { .. } => PacketId::RoomListRes,
            Self::CreateRoomResult { .. } => PacketId::CreateRoomRes,
        }
    }

    /// Encodes the response body.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut w = Writer::default();
        match self {
            Self::RegisterResult { success } => w.bool(*success),
            Self::LoginResult { success, user_id } => {
                w.bool(*success);
                w.u32(*user_id);
            }
            Self::EnterRoomResult { success, room_id }
            | Self::CreateRoomResult { success, room_id } => {
                w.bool(*success);
                w.i32(room_id.0);
            }
            Self::PlayerLeft { session_id } => w.u32(session_id.0),
            Self::ChatBroadcast { sender_id, text } => {
                w.u32(*sender_id);
                w.bounded_str(text, CHAT_LEN);
            }
            Self::Snapshot { tick, entries } => {
                w.u32(*tick);
                w.u32(entries.len() as u32);
                for entry in entries {
                    w.u32(entry.session_id.0);
                    w.f32(entry.x);
                    w.f32(entry.y);
                }
            }
            Self::RoomList { rooms } => {
                w.i32(rooms.len() as i32);
                for room in rooms {
                    w.i32(room.room_id.0);
                    w.i32(room.user_count);
                    w.fixed_str(&room.title, TITLE_LEN);
                }
            }
        }
        w.into_inner()
    }

    /// Decodes a response body (client side).
    ///
    /// Truncated repeated sections (snapshot entries, room rows) are
    /// reported as [`ProtocolError::BodyTooShort`].
    pub fn decode(packet_id: u16, body: &[u8]) -> Result<Self, ProtocolError> {
        let packet = PacketId::from_u16(packet_id).ok_or(ProtocolError::UnknownPacket(packet_id))?;
        let need = |expected: usize| {
            if body.len() < expected {
                Err(ProtocolError::BodyTooShort {
                    packet,
                    expected,
                    actual: body.len(),
                })
            } else {
                Ok(())
            }
        };

        let mut r = Reader::new(body);
        let response = match packet {
            PacketId::RegisterRes => {
                need(1)?;
                Self::RegisterResult { success: r.bool() }
            }
            PacketId::LoginRes => {
                need(5)?;
                Self::LoginResult {
                    success: r.bool(),
                    user_id: r.u32(),
                }
            }
            PacketId::EnterRoom => {
                need(5)?;
                Self::EnterRoomResult {
                    success: r.bool(),
                    room_id: RoomId(r.i32()),
                }
            }
            PacketId::CreateRoomRes => {
                need(5)?;
                Self::CreateRoomResult {
                    success: r.bool(),
                    room_id: RoomId(r.i32()),
                }
            }
            PacketId::LeaveRoom => {
                need(4)?;
                Self::PlayerLeft {
                    session_id: SessionId(r.u32()),
                }
            }
            PacketId::Chat => {
                need(4)?;
                let sender_id = r.u32();
                let text = r.fixed_str(r.remaining().min(CHAT_LEN));
                Self::ChatBroadcast { sender_id, text }
            }
            PacketId::Snapshot => {
                need(8)?;
                let tick = r.u32();
                let count = r.u32() as usize;
                need(8 + count.saturating_mul(12))?;
                let entries = (0..count)
                    .map(|_| SnapshotEntry {
                        session_id: SessionId(r.u32()),
                        x: r.f32(),
                        y: r.f32(),
                    })
                    .collect();
                Self::Snapshot { tick, entries }
            }
            PacketId::RoomListRes => {
                need(4)?;
                let count = r.i32().max(0) as usize;
                need(4 + count.saturating_mul(8 + TITLE_LEN))?;
                let rooms = (0..count)
                    .map(|_| RoomListEntry {
                        room_id: RoomId(r.i32()),
                        user_count: r.i32(),
                        title: r.fixed_str(TITLE_LEN),
                    })
                    .collect();
                Self::RoomList { rooms }
            }
            _ => return Err(ProtocolError::UnknownPacket(packet_id)),
        };
        Ok(response)
    }

    /// Encodes the full frame, header included.
    pub fn encode_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.packet_id(), &self.encode_body())
    }
}

// ---------------------------------------------------------------------------
// Framing helpers
// ---------------------------------------------------------------------------

/// Prepends a header to `body`.
///
/// # Errors
/// Returns [`ProtocolError::FrameTooLarge`] if header + body exceeds
/// [`MAX_FRAME_SIZE`].
pub fn encode_frame(packet_id: PacketId, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let total = HEADER_SIZE + body.len();
    if total > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(total));
    }
    let header = FrameHeader {
        total_size: total as u16,
        packet_id: packet_id.as_u16(),
    };
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Splits the first complete frame off the front of `buf`.
///
/// Returns the header, the body slice and the number of bytes consumed, or
/// `None` if `buf` does not yet hold a whole frame. Frames whose declared
/// size is smaller than the header are reported as
/// [`ProtocolError::InvalidSize`].
pub fn split_frame(buf: &[u8]) -> Result<Option<(FrameHeader, &[u8], usize)>, ProtocolError> {
    let Some(header) = FrameHeader::decode(buf) else {
        return Ok(None);
    };
    let total = header.total_len();
    if total < HEADER_SIZE {
        return Err(ProtocolError::InvalidSize(total));
    }
    match buf.get(HEADER_SIZE..total) {
        Some(body) => Ok(Some((header, body, total))),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Field readers / writers
// ---------------------------------------------------------------------------

/// Cursor over a body whose length was already validated by the caller.
///
/// Reads past the end yield zeros instead of panicking; `decode` checks
/// lengths up front so that only happens for optional trailing fields.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(src) = self.buf.get(self.pos..self.pos + N) {
            out.copy_from_slice(src);
        }
        self.pos += N;
        out
    }

    fn bool(&mut self) -> bool {
        self.take::<1>()[0] != 0
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    /// Reads a NUL-padded field of `len` bytes.
    fn fixed_str(&mut self, len: usize) -> String {
        let end = (self.pos + len).min(self.buf.len());
        let field = self.buf.get(self.pos..end).unwrap_or_default();
        self.pos += len;
        let text = field.split(|b| *b == 0).next().unwrap_or_default();
        String::from_utf8_lossy(text).into_owned()
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes exactly `len` bytes: the string truncated, then NUL padding.
    fn fixed_str(&mut self, s: &str, len: usize) {
        let bytes = truncate_utf8(s, len);
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + (len - bytes.len()), 0);
    }

    /// Writes at most `max` bytes with no padding.
    fn bounded_str(&mut self, s: &str, max: usize) {
        self.buf.extend_from_slice(truncate_utf8(s, max));
    }
}

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate_utf8(s: &str, max: usize) -> &[u8] {
    if s.len() <= max {
        return s.as_bytes();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s.as_bytes()[..end]
}
