//! Persistence for Skirmish.
//!
//! - **Seams** ([`Database`], [`DbConnection`], [`Cache`]): the external
//!   relational store and key-value cache, as synchronous traits.
//! - **In-memory stores** ([`MemoryDatabase`], [`MemoryCache`]): used when
//!   no external service is configured, and by tests.
//! - **Gateway** ([`PersistenceGateway`]): queued writes on a worker pool,
//!   synchronous authentication, presence and chat history.
//!
//! Results of queued work travel back through a [`PersistenceSink`], so
//! this crate does not need to know how sessions are looked up.

mod error;
mod gateway;
mod memory;
mod store;

pub use error::{CacheError, DbError, PersistenceError};
pub use gateway::{
    PRESENCE_KEY, PersistenceConfig, PersistenceGateway, PersistenceRequest, PersistenceSink,
    chat_key, chat_line,
};
pub use memory::{ChatLogRow, MemoryCache, MemoryDatabase};
pub use store::{Cache, Database, DbConnection, Row, Statement};
