//! The persistence gateway: a worker pool for writes and a synchronous
//! auth path.
//!
//! ```text
//!                   post_async ──▶ [ queue ] ──▶ worker 0 ─┐
//! game loop ──┤                                 worker 1 ─┼─▶ Database
//!             └── authenticate (auth connection) ─────────┘
//! ```
//!
//! Slow writes (chat log, registration) are queued and handled by `workers`
//! threads, each with its own database connection opened at start-up.
//! Login has to answer within the tick that handles it, so
//! [`authenticate`](PersistenceGateway::authenticate) runs on the caller's
//! thread over a separate connection reserved for that. Cache operations
//! (presence, recent chat) are also synchronous.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use skirmish_protocol::{RoomId, SessionId};

use crate::{Cache, Database, DbConnection, DbError, PersistenceError, Statement};

/// Cache key of the set of logged-in usernames.
pub const PRESENCE_KEY: &str = "presence:online";

/// Cache key of a room's recent chat list.
pub fn chat_key(room_id: RoomId) -> String {
    format!("chat:room:{}", room_id.0)
}

/// How a chat line is shown and cached.
pub fn chat_line(username: &str, message: &str) -> String {
    format!("{username}: {message}")
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Work for the persistence workers. Login is never queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceRequest {
    SaveChat {
        session_id: SessionId,
        username: String,
        message: String,
        room_id: RoomId,
    },
    Register {
        session_id: SessionId,
        username: String,
        password: String,
    },
}

/// Receives results of queued work that a client is waiting for.
///
/// Called on a worker thread.
pub trait PersistenceSink: Send + Sync + 'static {
    /// A registration finished. `success` is false for a taken username
    /// and for database errors alike.
    fn register_completed(&self, session_id: SessionId, success: bool);
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Number of worker threads (and database connections). At least 1.
    pub workers: usize,

    /// How many chat lines each room keeps in the cache.
    pub chat_history_len: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            chat_history_len: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

struct Queue {
    requests: VecDeque<PersistenceRequest>,
    running: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

/// Front door to the database and cache.
pub struct PersistenceGateway {
    shared: Arc<Shared>,
    auth: Mutex<Box<dyn DbConnection>>,
    cache: Arc<dyn Cache>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PersistenceConfig,
}

impl PersistenceGateway {
    /// Opens every connection, then starts the workers.
    ///
    /// # Errors
    /// - [`PersistenceError::Db`] if any connection cannot be opened. No
    ///   thread has been started in that case.
    /// - [`PersistenceError::Spawn`] if a worker thread cannot be created.
    pub fn start(
        db: Arc<dyn Database>,
        cache: Arc<dyn Cache>,
        config: PersistenceConfig,
        sink: Arc<dyn PersistenceSink>,
    ) -> Result<Self, PersistenceError> {
        let worker_count = config.workers.max(1);
        let connections = (0..worker_count)
            .map(|_| db.connect())
            .collect::<Result<Vec<_>, DbError>>()?;
        let auth = db.connect()?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                requests: VecDeque::new(),
                running: true,
            }),
            ready: Condvar::new(),
        });

        let gateway = Self {
            shared: Arc::clone(&shared),
            auth: Mutex::new(auth),
            cache,
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            config,
        };

        for (index, conn) in connections.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let sink = Arc::clone(&sink);
            let handle = std::thread::Builder::new()
                .name(format!("persistence-{index}"))
                .spawn(move || worker_loop(index, &shared, conn, sink.as_ref()))
                .map_err(PersistenceError::Spawn)?;
            gateway.workers.lock().push(handle);
        }

        tracing::info!(workers = worker_count, "persistence gateway started");
        Ok(gateway)
    }

    /// Queues a request for the workers. Returns `false` after
    /// [`stop`](Self::stop).
    pub fn post_async(&self, request: PersistenceRequest) -> bool {
        let mut queue = self.shared.queue.lock();
        if !queue.running {
            tracing::debug!(?request, "persistence stopped, request dropped");
            return false;
        }
        queue.requests.push_back(request);
        drop(queue);
        self.shared.ready.notify_one();
        true
    }

    /// Requests waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().requests.len()
    }

    /// Checks credentials over the auth connection.
    ///
    /// Returns the user id on a match. Unknown users, wrong passwords and
    /// database errors all return `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<u32> {
        let statement = Statement::SelectUser {
            username: username.to_string(),
            password: password.to_string(),
        };
        let rows = match self.auth.lock().query(&statement) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(user = username, error = %e, "authentication query failed");
                return None;
            }
        };
        // Credentials are stored and compared in plain text.
        rows.first().map(|row| row.user_id)
    }

    /// Adds `username` to the online set. Returns `false` if it was already
    /// there (duplicate login) or the cache failed.
    pub fn check_and_register_presence(&self, username: &str) -> bool {
        match self.cache.add_to_set(PRESENCE_KEY, username) {
            Ok(added) => added,
            Err(e) => {
                tracing::error!(user = username, error = %e, "presence update failed");
                false
            }
        }
    }

    /// Removes `username` from the online set.
    pub fn remove_presence(&self, username: &str) {
        if let Err(e) = self.cache.remove_from_set(PRESENCE_KEY, username) {
            tracing::error!(user = username, error = %e, "presence removal failed");
        }
    }

    /// Recent chat lines for a room, newest first.
    pub fn recent_chat(&self, room_id: RoomId) -> Vec<String> {
        if self.config.chat_history_len == 0 {
            return Vec::new();
        }
        let last = self.config.chat_history_len.saturating_sub(1);
        self.cache
            .list_range(&chat_key(room_id), 0, last)
            .unwrap_or_else(|e| {
                tracing::error!(%room_id, error = %e, "chat history read failed");
                Vec::new()
            })
    }

    /// Records a chat line in the room's bounded history.
    pub fn cache_chat(&self, room_id: RoomId, username: &str, message: &str) {
        if self.config.chat_history_len == 0 {
            return;
        }
        let key = chat_key(room_id);
        let last = self.config.chat_history_len.saturating_sub(1);
        let result = self
            .cache
            .push_list(&key, &chat_line(username, message))
            .and_then(|_| self.cache.trim_list(&key, 0, last));
        if let Err(e) = result {
            tracing::error!(%room_id, error = %e, "chat history write failed");
        }
    }

    /// Stops accepting requests, lets the workers drain the queue, and
    /// joins them. Safe to call more than once.
    pub fn stop(&self) {
        self.shared.queue.lock().running = false;
        self.shared.ready.notify_all();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("persistence worker panicked");
            }
        }
        tracing::info!("persistence gateway stopped");
    }
}

impl Drop for PersistenceGateway {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    index: usize,
    shared: &Shared,
    mut conn: Box<dyn DbConnection>,
    sink: &dyn PersistenceSink,
) {
    tracing::debug!(worker = index, "persistence worker started");
    loop {
        let request = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(request) = queue.requests.pop_front() {
                    break Some(request);
                }
                if !queue.running {
                    break None;
                }
                shared.ready.wait(&mut queue);
            }
        };
        match request {
            Some(request) => handle_request(conn.as_mut(), sink, request),
            None => break,
        }
    }
    tracing::debug!(worker = index, "persistence worker exiting");
}

fn handle_request(conn: &mut dyn DbConnection, sink: &dyn PersistenceSink, request: PersistenceRequest) {
    match request {
        PersistenceRequest::SaveChat {
            session_id,
            username,
            message,
            room_id,
        } => {
            let statement = Statement::InsertChatLog {
                session_id,
                username,
                message,
                room_id,
            };
            if let Err(e) = conn.execute(&statement) {
                tracing::error!(%session_id, %room_id, error = %e, "chat log write failed");
            }
        }
        PersistenceRequest::Register {
            session_id,
            username,
            password,
        } => {
            let statement = Statement::InsertUser {
                username: username.clone(),
                password,
            };
            let success = match conn.execute(&statement) {
                Ok(_) => {
                    tracing::info!(%session_id, user = %username, "user registered");
                    true
                }
                Err(DbError::DuplicateKey(_)) => {
                    tracing::info!(%session_id, user = %username, "registration rejected: name taken");
                    false
                }
                Err(e) => {
                    tracing::error!(%session_id, user = %username, error = %e, "registration failed");
                    false
                }
            };
            sink.register_completed(session_id, success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_partial_json() {
        assert_eq!(PersistenceConfig::default().workers, 2);
        let config: PersistenceConfig = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.chat_history_len, 50);
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(chat_key(RoomId(42)), "chat:room:42");
        assert_eq!(chat_line("bob", "hi"), "bob: hi");
    }
}
