//! The storage seams: a relational database and a key-value cache.
//!
//! Both are external services in production. The gateway only ever talks
//! to them through these traits, which are synchronous: every call is made
//! from a persistence worker thread or from the game loop's auth path, never
//! from async code.

use skirmish_protocol::{RoomId, SessionId};

use crate::{CacheError, DbError};

/// The statements the server issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Append one line to the chat log.
    InsertChatLog {
        session_id: SessionId,
        username: String,
        message: String,
        room_id: RoomId,
    },
    /// Create an account. `username` is unique.
    InsertUser { username: String, password: String },
    /// Look an account up by name and password.
    SelectUser { username: String, password: String },
}

impl Statement {
    /// Statement name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertChatLog { .. } => "INSERT_CHAT_LOG",
            Self::InsertUser { .. } => "INSERT_USER",
            Self::SelectUser { .. } => "SELECT_USER",
        }
    }
}

/// A user account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub user_id: u32,
    pub username: String,
    pub password: String,
}

/// A connection factory.
pub trait Database: Send + Sync + 'static {
    /// Opens a new connection.
    ///
    /// # Errors
    /// Returns [`DbError::Connection`] if the database is unreachable.
    fn connect(&self) -> Result<Box<dyn DbConnection>, DbError>;
}

/// One open connection. Used by one thread at a time.
pub trait DbConnection: Send {
    /// Runs a write statement and returns the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<u64, DbError>;

    /// Runs a read statement.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError>;
}

/// The key-value cache: string sets and string lists.
pub trait Cache: Send + Sync + 'static {
    /// Adds `member` to the set at `key`. Returns `true` if it was not
    /// already there.
    fn add_to_set(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    /// Removes `member` from the set at `key`. Returns `true` if it was there.
    fn remove_from_set(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    /// Pushes `value` onto the front of the list at `key`. Returns the new
    /// length.
    fn push_list(&self, key: &str, value: &str) -> Result<usize, CacheError>;

    /// Keeps only elements `start..=stop` of the list at `key`.
    fn trim_list(&self, key: &str, start: usize, stop: usize) -> Result<(), CacheError>;

    /// Elements `start..=stop` of the list at `key`, front first. Indexes
    /// past the end are clamped.
    fn list_range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, CacheError>;
}
