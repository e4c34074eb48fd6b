//! The receive buffer: TCP stream reassembly into whole packets.
//!
//! TCP delivers a byte stream, not messages. One receive may carry half a
//! header, three packets and the start of a fourth. The buffer accumulates
//! bytes at `write_pos` and hands out complete packets from `read_pos`:
//!
//! ```text
//! 0          read_pos              write_pos          capacity
//! |  consumed  |  unread packet bytes  |     free space     |
//! ```
//!
//! When free space drops below [`LOW_WATER_MARK`] the unread bytes are moved
//! back to offset 0. The region never grows: a peer that sends more than the
//! buffer can hold gets a [`SessionError::BufferOverflow`].

use skirmish_protocol::{FrameHeader, HEADER_SIZE, PacketId, Request, SessionId, split_frame};

use crate::{Command, MalformedPacket, SessionError};

/// Default size of the per-session receive region.
pub const RECV_CAPACITY: usize = 8 * 1024;

/// Compact once free space falls below this many bytes.
pub const LOW_WATER_MARK: usize = 1024;

/// Fixed-capacity reassembly buffer.
///
/// Invariant: `read_pos <= write_pos <= capacity`.
#[derive(Debug)]
pub struct RecvBuffer {
    data: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl RecvBuffer {
    /// Creates a buffer of [`RECV_CAPACITY`] bytes.
    pub fn new() -> Self {
        Self::with_capacity(RECV_CAPACITY)
    }

    /// Creates a buffer with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Bytes received but not yet consumed.
    pub fn unread(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Room left at the end of the region.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.write_pos
    }

    /// Copies freshly received bytes in at `write_pos`.
    ///
    /// # Errors
    /// Returns [`SessionError::BufferOverflow`] if the bytes do not fit.
    /// Nothing is copied in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let free = self.free_space();
        if bytes.len() > free {
            return Err(SessionError::BufferOverflow {
                needed: bytes.len(),
                free,
            });
        }
        self.data[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
        Ok(())
    }

    fn unread_bytes(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Header of the packet at `read_pos`, if four bytes are available.
    pub fn peek_header(&self) -> Option<FrameHeader> {
        FrameHeader::decode(self.unread_bytes())
    }

    /// True if at least one whole, well-sized packet is buffered.
    pub fn has_complete_packet(&self) -> bool {
        matches!(split_frame(self.unread_bytes()), Ok(Some(_)))
    }

    /// Reports a packet that can never be completed.
    ///
    /// Returns the declared size if the header at `read_pos` claims fewer
    /// bytes than a header or more than the buffer can ever hold.
    pub fn pending_fault(&self) -> Option<usize> {
        let declared = self.peek_header()?.total_len();
        (declared < HEADER_SIZE || declared > self.capacity()).then_some(declared)
    }

    /// Decodes the packet at `read_pos` into a command.
    ///
    /// Returns `Ok(None)` if no complete packet is buffered. On success the
    /// read cursor moves past the whole packet, including any body bytes
    /// beyond the packet's fixed layout.
    ///
    /// # Errors
    /// Returns [`MalformedPacket`] if the body does not decode. The cursor
    /// is not moved; call [`skip_packet`](Self::skip_packet) to step over it.
    pub fn extract_next_command(
        &mut self,
        session_id: SessionId,
    ) -> Result<Option<Command>, MalformedPacket> {
        let Ok(Some((header, body, consumed))) = split_frame(self.unread_bytes()) else {
            return Ok(None);
        };
        let request = Request::decode(header.packet_id, body).map_err(|error| MalformedPacket {
            packet_id: header.packet_id,
            size: consumed,
            error,
        })?;
        self.read_pos += consumed;
        Ok(Some(Command::from_request(session_id, request)))
    }

    /// Steps over the complete packet at `read_pos` without decoding it.
    ///
    /// Returns `false` (and does nothing) if no complete packet is buffered.
    pub fn skip_packet(&mut self) -> bool {
        match split_frame(self.unread_bytes()) {
            Ok(Some((_, _, consumed))) => {
                self.read_pos += consumed;
                true
            }
            _ => false,
        }
    }

    /// Compacts if free space is below [`LOW_WATER_MARK`].
    pub fn compact_if_needed(&mut self) -> bool {
        if self.free_space() >= LOW_WATER_MARK {
            return false;
        }
        self.compact();
        true
    }

    /// Moves the unread bytes to offset 0.
    pub fn compact(&mut self) {
        let unread = self.unread();
        if self.read_pos > 0 {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
        }
        self.read_pos = 0;
        self.write_pos = unread;
    }
}

impl Default for RecvBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// True if a malformed packet of this id is one we step over rather than
/// drop the connection for.
pub(crate) fn is_login(packet_id: u16) -> bool {
    packet_id == PacketId::LoginReq.as_u16()
}
