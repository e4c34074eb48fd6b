//! The session directory: every live session, by id.
//!
//! Reactor threads look sessions up here to route completions, the game
//! loop looks them up to reply, and the accept loop inserts new ones. All of
//! that goes through one coarse lock; each operation holds it only long
//! enough to touch the map.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use skirmish_protocol::SessionId;

use crate::Session;

/// Registry of live sessions.
#[derive(Debug)]
pub struct SessionDirectory {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU32,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Hands out the next session id. Ids start at 1 and are never reused.
    pub fn allocate_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a session, replacing any previous entry with the same id.
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.lock().insert(session.id(), session);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Disconnects and removes every session (server shutdown).
    ///
    /// Sessions are disconnected after the lock is released.
    pub fn disconnect_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.disconnect();
        }
        drained.len()
    }
}

impl Default for SessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use skirmish_transport::MemoryLink;

    use super::*;
    use crate::command_queue;

    #[test]
    fn test_insert_get_remove() {
        let directory = SessionDirectory::new();
        let (tx, _rx) = command_queue();
        let id = directory.allocate_id();
        assert_eq!(id, SessionId(1));

        let session = Arc::new(Session::new(id, Box::new(MemoryLink::new()), tx));
        directory.insert(Arc::clone(&session));
        assert_eq!(directory.len(), 1);
        assert!(Arc::ptr_eq(&directory.get(id).unwrap(), &session));

        assert!(directory.remove(id).is_some());
        assert!(directory.get(id).is_none());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let directory = SessionDirectory::new();
        let a = directory.allocate_id();
        let b = directory.allocate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_disconnect_all_closes_every_link() {
        let directory = SessionDirectory::new();
        let (tx, _rx) = command_queue();
        let links: Vec<_> = (0..3).map(|_| MemoryLink::new()).collect();
        for link in &links {
            let id = directory.allocate_id();
            directory.insert(Arc::new(Session::new(id, Box::new(link.clone()), tx.clone())));
        }

        assert_eq!(directory.disconnect_all(), 3);
        assert!(directory.is_empty());
        assert!(links.iter().all(MemoryLink::is_closed));
    }
}
