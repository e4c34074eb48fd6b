//! Transport layer for Skirmish.
//!
//! Sockets are driven by the Tokio runtime, but nothing above this crate
//! awaits on them. Instead every finished operation is posted as a
//! [`Completion`] to a shared [`CompletionPort`], and a pool of reactor
//! threads dispatches those completions to sessions.
//!
//! ```text
//! TcpLink (tokio task) ──post──▶ CompletionPort ──wait──▶ reactor thread
//! ```
//!
//! Sessions talk to their socket through the [`Link`] trait, which only
//! *starts* operations. That keeps the session logic synchronous and lets
//! tests drive it with an in-memory link ([`MemoryLink`]).
//!
//! # Feature Flags
//!
//! - `tcp` (default): TCP transport over `tokio::net`

mod completion;
mod error;
mod memory;
#[cfg(feature = "tcp")]
mod tcp;

pub use completion::{Completion, CompletionPort, CompletionReceiver, CompletionSender, IoOp};
pub use error::TransportError;
pub use memory::MemoryLink;
#[cfg(feature = "tcp")]
pub use tcp::{TcpLink, TcpTransport};

/// One connection's socket, seen from the session that owns it.
///
/// Each method starts an operation and returns immediately. The result
/// arrives later on the completion port, tagged with the session id the
/// link was created for.
pub trait Link: Send + Sync + 'static {
    /// Starts a receive of at most `max_len` bytes.
    ///
    /// Completes with [`Completion::Received`] (empty data on orderly
    /// close) or [`Completion::Failed`]. A receive pending when the link is
    /// closed never completes.
    fn arm_receive(&self, max_len: usize);

    /// Starts writing one whole frame.
    ///
    /// Completes with [`Completion::Sent`] once every byte is written, or
    /// [`Completion::Failed`].
    fn begin_send(&self, frame: Vec<u8>);

    /// Closes the socket. Pending receives are cancelled.
    fn close(&self);
}
