//! In-memory database and cache.
//!
//! Used for local runs and tests. Both are cheap to clone; clones share the
//! same state, so a test can keep a handle and inspect what the server
//! wrote. `MemoryDatabase` can also be told to fail upcoming statements.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use skirmish_protocol::{RoomId, SessionId};

use crate::{Cache, CacheError, Database, DbConnection, DbError, Row, Statement};

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// A stored chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLogRow {
    pub session_id: SessionId,
    pub username: String,
    pub message: String,
    pub room_id: RoomId,
}

#[derive(Debug)]
struct DbState {
    users: HashMap<String, Row>,
    next_user_id: u32,
    chat_log: Vec<ChatLogRow>,
    failing_executes: usize,
    refuse_connections: bool,
    connections_opened: usize,
}

/// Thread-safe in-memory [`Database`].
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    state: Arc<Mutex<DbState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DbState {
                users: HashMap::new(),
                next_user_id: 1,
                chat_log: Vec::new(),
                failing_executes: 0,
                refuse_connections: false,
                connections_opened: 0,
            })),
        }
    }

    /// Inserts an account with a fixed id.
    pub fn seed_user(&self, user_id: u32, username: &str, password: &str) {
        let mut state = self.state.lock();
        state.users.insert(
            username.to_string(),
            Row {
                user_id,
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        state.next_user_id = state.next_user_id.max(user_id.saturating_add(1));
    }

    /// Makes the next `count` calls to `execute` fail with a connection
    /// error.
    pub fn fail_next_execute(&self, count: usize) {
        self.state.lock().failing_executes = count;
    }

    /// Makes `connect` fail from now on.
    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connections = true;
    }

    pub fn connections_opened(&self) -> usize {
        self.state.lock().connections_opened
    }

    pub fn user(&self, username: &str) -> Option<Row> {
        self.state.lock().users.get(username).cloned()
    }

    pub fn chat_log(&self) -> Vec<ChatLogRow> {
        self.state.lock().chat_log.clone()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDatabase {
    fn connect(&self) -> Result<Box<dyn DbConnection>, DbError> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(DbError::Connection("connection refused".into()));
        }
        state.connections_opened += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<DbState>>,
}

impl DbConnection for MemoryConnection {
    fn execute(&mut self, statement: &Statement) -> Result<u64, DbError> {
        let mut state = self.state.lock();
        if state.failing_executes > 0 {
            state.failing_executes -= 1;
            return Err(DbError::Connection("injected failure".into()));
        }
        match statement {
            Statement::InsertChatLog {
                session_id,
                username,
                message,
                room_id,
            } => {
                state.chat_log.push(ChatLogRow {
                    session_id: *session_id,
                    username: username.clone(),
                    message: message.clone(),
                    room_id: *room_id,
                });
                Ok(1)
            }
            Statement::InsertUser { username, password } => {
                if state.users.contains_key(username) {
                    return Err(DbError::DuplicateKey(username.clone()));
                }
                let user_id = state.next_user_id;
                state.next_user_id += 1;
                state.users.insert(
                    username.clone(),
                    Row {
                        user_id,
                        username: username.clone(),
                        password: password.clone(),
                    },
                );
                Ok(1)
            }
            Statement::SelectUser { .. } => Err(DbError::Query(format!(
                "{} is not a write statement",
                statement.name()
            ))),
        }
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError> {
        match statement {
            Statement::SelectUser { username, password } => Ok(self
                .state
                .lock()
                .users
                .get(username)
                .filter(|row| row.password == *password)
                .cloned()
                .into_iter()
                .collect()),
            other => Err(DbError::Query(format!("{} is not a query", other.name()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CacheState {
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
}

/// Thread-safe in-memory [`Cache`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of the set at `key`, sorted.
    pub fn set_members(&self, key: &str) -> Vec<String> {
        let mut members: Vec<_> = self
            .state
            .lock()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn list_len(&self, key: &str) -> usize {
        self.state.lock().lists.get(key).map_or(0, VecDeque::len)
    }
}

impl Cache for MemoryCache {
    fn add_to_set(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        Ok(self
            .state
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn remove_from_set(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        Ok(self
            .state
            .lock()
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    fn push_list(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        let mut state = self.state.lock();
        let list = state.lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        Ok(list.len())
    }

    fn trim_list(&self, key: &str, start: usize, stop: usize) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        if let Some(list) = state.lists.get_mut(key) {
            list.truncate(stop.saturating_add(1));
            list.drain(..start.min(list.len()));
        }
        Ok(())
    }

    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, CacheError> {
        let state = self.state.lock();
        Ok(state
            .lists
            .get(key)
            .map(|list| {
                list.iter()
                    .skip(start)
                    .take(stop.saturating_sub(start).saturating_add(1))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_user_rejects_duplicates() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect().unwrap();
        let insert = Statement::InsertUser {
            username: "bob".into(),
            password: "pw".into(),
        };
        assert_eq!(conn.execute(&insert), Ok(1));
        assert_eq!(
            conn.execute(&insert),
            Err(DbError::DuplicateKey("bob".into()))
        );
    }

    #[test]
    fn test_seeded_user_is_selectable_and_ids_continue() {
        let db = MemoryDatabase::new();
        db.seed_user(42, "bob", "pw");
        let mut conn = db.connect().unwrap();

        let rows = conn
            .query(&Statement::SelectUser {
                username: "bob".into(),
                password: "pw".into(),
            })
            .unwrap();
        assert_eq!(rows[0].user_id, 42);
        let wrong = conn
            .query(&Statement::SelectUser {
                username: "bob".into(),
                password: "nope".into(),
            })
            .unwrap();
        assert!(wrong.is_empty());

        conn.execute(&Statement::InsertUser {
            username: "amy".into(),
            password: "x".into(),
        })
        .unwrap();
        assert_eq!(db.user("amy").unwrap().user_id, 43);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let db = MemoryDatabase::new();
        db.fail_next_execute(1);
        let mut conn = db.connect().unwrap();
        let stmt = Statement::InsertChatLog {
            session_id: SessionId(3),
            username: "bob".into(),
            message: "hi".into(),
            room_id: RoomId(1),
        };
        assert!(matches!(conn.execute(&stmt), Err(DbError::Connection(_))));
        assert_eq!(conn.execute(&stmt), Ok(1));
        assert_eq!(db.chat_log()[0].session_id, SessionId(3));
    }

    #[test]
    fn test_refused_connections() {
        let db = MemoryDatabase::new();
        db.refuse_connections();
        assert!(db.connect().is_err());
        assert_eq!(db.connections_opened(), 0);
    }

    #[test]
    fn test_set_semantics() {
        let cache = MemoryCache::new();
        assert_eq!(cache.add_to_set("k", "bob"), Ok(true));
        assert_eq!(cache.add_to_set("k", "bob"), Ok(false));
        assert_eq!(cache.remove_from_set("k", "bob"), Ok(true));
        assert_eq!(cache.remove_from_set("k", "bob"), Ok(false));
        assert_eq!(cache.remove_from_set("missing", "bob"), Ok(false));
    }

    #[test]
    fn test_list_push_front_trim_and_range() {
        let cache = MemoryCache::new();
        for i in 0..5 {
            cache.push_list("l", &i.to_string()).unwrap();
        }
        assert_eq!(cache.list_range("l", 0, 1).unwrap(), vec!["4", "3"]);

        cache.trim_list("l", 0, 2).unwrap();
        assert_eq!(cache.list_range("l", 0, 99).unwrap(), vec!["4", "3", "2"]);

        cache.trim_list("l", 1, 2).unwrap();
        assert_eq!(cache.list_range("l", 0, 99).unwrap(), vec!["3", "2"]);
        assert!(cache.list_range("none", 0, 10).unwrap().is_empty());
    }
}
