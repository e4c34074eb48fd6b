//! An in-memory [`Link`] that records what was asked of it.
//!
//! Nothing is actually sent anywhere. The session under test starts
//! operations, and the test decides when they "complete" by calling back
//! into the session itself. That makes ordering and single-flight
//! properties checkable without sockets or timing.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::Link;

#[derive(Debug, Default)]
struct LinkLog {
    armed: Vec<usize>,
    sent: Vec<Vec<u8>>,
    in_flight: usize,
    max_in_flight: usize,
    close_calls: usize,
}

/// Recording link. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    log: Arc<Mutex<LinkLog>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame handed to `begin_send`, in order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.log.lock().sent.clone()
    }

    /// Sends started but not yet completed with [`complete_send`](Self::complete_send).
    pub fn in_flight(&self) -> usize {
        self.log.lock().in_flight
    }

    /// The most sends that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.log.lock().max_in_flight
    }

    /// Marks one outstanding send as finished. Returns `false` if none was.
    pub fn complete_send(&self) -> bool {
        let mut log = self.log.lock();
        if log.in_flight == 0 {
            return false;
        }
        log.in_flight -= 1;
        true
    }

    /// Sizes passed to each `arm_receive`, in order.
    pub fn armed(&self) -> Vec<usize> {
        self.log.lock().armed.clone()
    }

    /// How many times `close` was called.
    pub fn close_calls(&self) -> usize {
        self.log.lock().close_calls
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}

impl Link for MemoryLink {
    fn arm_receive(&self, max_len: usize) {
        self.log.lock().armed.push(max_len);
    }

    fn begin_send(&self, frame: Vec<u8>) {
        let mut log = self.log.lock();
        log.sent.push(frame);
        log.in_flight += 1;
        log.max_in_flight = log.max_in_flight.max(log.in_flight);
    }

    fn close(&self) {
        self.log.lock().close_calls += 1;
    }
}
