//! Framed sessions for Skirmish.
//!
//! This crate turns a client's byte stream into [`Command`]s and the game
//! loop's responses back into frames:
//!
//! 1. **Reassembly**: [`RecvBuffer`] accumulates received bytes and yields
//!    complete packets, however TCP chunked them.
//! 2. **Outbound delivery**: [`Session`] keeps a FIFO of frames with at most
//!    one send in flight.
//! 3. **Lifecycle**: [`Session::disconnect`] is idempotent and hands the
//!    game loop a `Logout` for logged-in players.
//! 4. **Lookup**: [`SessionDirectory`] maps ids to live sessions.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game loop (above)     ← drains Commands, queues Responses
//!     ↕
//! Session (this crate)  ← framing, command queue, directory
//!     ↕
//! Transport (below)     ← Link operations and completions
//! ```

mod buffer;
mod command;
mod directory;
mod error;
mod session;

pub use buffer::{LOW_WATER_MARK, RECV_CAPACITY, RecvBuffer};
pub use command::{Command, CommandReceiver, CommandSender, command_queue};
pub use directory::SessionDirectory;
pub use error::{MalformedPacket, SessionError};
pub use session::{GUEST_NAME, Session};
