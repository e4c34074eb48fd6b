//! Error types for the persistence layer.
//!
//! None of these reach a client. The gateway logs them and turns them into
//! a failed result (`false`, `None`, an empty history), so a database outage
//! degrades features instead of stopping the game loop.

/// Errors reported by a [`DbConnection`](crate::DbConnection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// A unique constraint rejected the row (e.g. a taken username).
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The connection could not be opened or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// The statement failed for another reason.
    #[error("query failed: {0}")]
    Query(String),
}

/// Errors reported by a [`Cache`](crate::Cache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Errors from starting or using the gateway itself.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Opening the per-worker or auth connections failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn persistence worker: {0}")]
    Spawn(#[source] std::io::Error),
}
