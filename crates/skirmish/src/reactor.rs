//! The I/O reactor: a pool of threads that turns completions into session
//! calls.
//!
//! ```text
//!   tokio I/O tasks ──post──▶ CompletionPort ──wait──▶ reactor-0 ─┐
//!                                                   ──▶ reactor-1 ─┼─▶ Session
//!                                                   ──▶ reactor-N ─┘
//! ```
//!
//! Sockets are driven by the tokio runtime; each finished read or write
//! lands on the completion port. Reactor threads pick completions off the
//! port and hand them to the owning session: received bytes go through the
//! session's framing (which queues commands for the game loop), finished
//! sends release the next queued frame. A closed peer or a failed operation
//! disconnects the session.
//!
//! The reactor never touches rooms or players. A disconnect reaches the game
//! loop only as the Logout command the session queues for itself.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::JoinHandle;

use skirmish_transport::{Completion, CompletionPort, CompletionReceiver, CompletionSender};
use skirmish_session::{Session, SessionDirectory};

use crate::SkirmishError;

/// Worker threads draining the completion port.
pub struct ReactorPool {
    workers: Vec<JoinHandle<()>>,
    port: CompletionSender,
}

impl ReactorPool {
    /// Starts `threads` workers (at least one) on `port`.
    ///
    /// # Errors
    /// Returns [`SkirmishError::Io`] if a thread cannot be spawned. Workers
    /// already started are stopped first.
    pub fn start(
        threads: usize,
        port: &CompletionPort,
        directory: Arc<SessionDirectory>,
        tolerate_malformed_login: bool,
    ) -> Result<Self, SkirmishError> {
        let mut pool = Self {
            workers: Vec::with_capacity(threads.max(1)),
            port: port.sender(),
        };
        for index in 0..threads.max(1) {
            let completions = port.receiver();
            let directory = Arc::clone(&directory);
            let spawned = std::thread::Builder::new()
                .name(format!("reactor-{index}"))
                .spawn(move || worker_loop(index, &completions, &directory, tolerate_malformed_login));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.stop();
                    return Err(e.into());
                }
            }
        }
        tracing::info!(threads = pool.workers.len(), "reactor started");
        Ok(pool)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Posts one shutdown sentinel per worker and joins them all.
    ///
    /// Completions queued ahead of the sentinels are still dispatched.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for _ in 0..self.workers.len() {
            self.port.post(Completion::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("reactor worker panicked");
            }
        }
        tracing::info!("reactor stopped");
    }
}

impl Drop for ReactorPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    index: usize,
    completions: &CompletionReceiver,
    directory: &SessionDirectory,
    tolerate_malformed_login: bool,
) {
    tracing::debug!(worker = index, "reactor worker started");
    while dispatch(completions.wait(), directory, tolerate_malformed_login).is_continue() {}
    tracing::debug!(worker = index, "reactor worker exiting");
}

/// Routes one completion to its session. Breaks on the shutdown sentinel.
pub fn dispatch(
    completion: Completion,
    directory: &SessionDirectory,
    tolerate_malformed_login: bool,
) -> ControlFlow<()> {
    let Some(session_id) = completion.session() else {
        return ControlFlow::Break(());
    };
    let Some(session) = directory.get(session_id) else {
        tracing::trace!(%session_id, "completion for unknown session ignored");
        return ControlFlow::Continue(());
    };

    match completion {
        Completion::Received { data, .. } if data.is_empty() => {
            tracing::debug!(%session_id, "peer closed connection");
            close(&session, directory);
        }
        Completion::Received { data, .. } => {
            if let Err(e) = session.on_received(&data, tolerate_malformed_login) {
                tracing::warn!(%session_id, error = %e, "dropping connection");
                close(&session, directory);
            }
        }
        Completion::Sent { bytes, .. } => {
            tracing::trace!(%session_id, bytes, "send completed");
            session.on_send_completed();
        }
        Completion::Failed { op, error, .. } => {
            tracing::debug!(%session_id, ?op, error = %error, "I/O failed");
            close(&session, directory);
        }
        Completion::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

fn close(session: &Session, directory: &SessionDirectory) {
    session.disconnect();
    directory.remove(session.id());
}
