//! The completion port: a shared queue of finished I/O operations.
//!
//! Socket operations run asynchronously on the Tokio runtime. When one
//! finishes, the task that ran it posts a [`Completion`] here. A small pool
//! of reactor threads blocks on the port and routes each completion to the
//! session it names.
//!
//! The port is a multi-producer, multi-consumer `crossbeam-channel`: every
//! I/O task holds a [`CompletionSender`], every reactor thread holds a
//! [`CompletionReceiver`] clone, and each completion is delivered to exactly
//! one of them.

use crossbeam_channel::{Receiver, Sender, unbounded};
use skirmish_protocol::SessionId;

/// Which kind of operation a failed completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Receive,
    Send,
}

/// A finished I/O operation.
#[derive(Debug)]
pub enum Completion {
    /// A receive finished. An empty `data` means the peer closed the stream.
    Received { session: SessionId, data: Vec<u8> },

    /// A send finished after writing `bytes` bytes.
    Sent { session: SessionId, bytes: usize },

    /// An operation failed at the OS level.
    Failed {
        session: SessionId,
        op: IoOp,
        error: std::io::Error,
    },

    /// Sentinel telling one reactor worker to exit its loop.
    Shutdown,
}

impl Completion {
    /// The session this completion belongs to (`None` for the sentinel).
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Received { session, .. }
            | Self::Sent { session, .. }
            | Self::Failed { session, .. } => Some(*session),
            Self::Shutdown => None,
        }
    }
}

/// Owner of both ends of the completion queue.
pub struct CompletionPort {
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
}

impl CompletionPort {
    /// Creates an empty, unbounded port.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// A handle for posting completions (given to links).
    pub fn sender(&self) -> CompletionSender {
        CompletionSender(self.sender.clone())
    }

    /// A handle for waiting on completions (one per reactor thread).
    pub fn receiver(&self) -> CompletionReceiver {
        CompletionReceiver(self.receiver.clone())
    }

    /// Number of completions waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for CompletionPort {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable posting side of the port.
#[derive(Clone)]
pub struct CompletionSender(Sender<Completion>);

impl CompletionSender {
    /// Posts a completion. Returns `false` if every receiver is gone
    /// (the reactor has shut down), in which case the completion is dropped.
    pub fn post(&self, completion: Completion) -> bool {
        self.0.send(completion).is_ok()
    }
}

/// Cloneable waiting side of the port.
#[derive(Clone)]
pub struct CompletionReceiver(Receiver<Completion>);

impl CompletionReceiver {
    /// Blocks until a completion is available.
    ///
    /// If every sender has been dropped this returns [`Completion::Shutdown`]
    /// so worker loops still terminate.
    pub fn wait(&self) -> Completion {
        self.0.recv().unwrap_or(Completion::Shutdown)
    }

    /// Returns a completion if one is ready, without blocking.
    pub fn try_wait(&self) -> Option<Completion> {
        self.0.try_recv().ok()
    }
}
