//! # Skirmish
//!
//! Authoritative real-time multiplayer session server.
//!
//! Clients connect over TCP and speak a small binary protocol: register,
//! log in, enter a room, move, chat. The server owns the simulation. It
//! integrates every player's position at a fixed tick rate and broadcasts a
//! snapshot of each room to its members every tick.
//!
//! ```text
//!  ┌──────────────┐   bytes    ┌─────────────┐  commands  ┌────────────┐
//!  │ tokio I/O +  │ ─────────▶ │  sessions   │ ─────────▶ │ game loop  │
//!  │ reactor pool │ ◀───────── │ (framing)   │ ◀───────── │ (60 Hz)    │
//!  └──────────────┘   frames   └─────────────┘  replies   └─────┬──────┘
//!                                                               │
//!                                        rooms ◀────────────────┤
//!                                        persistence workers ◀──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skirmish::prelude::*;
//!
//! let server = SkirmishServer::builder()
//!     .bind("127.0.0.1:9190")
//!     .start()?;
//! println!("listening on {}", server.local_addr());
//! server.run_until_ctrl_c()?;
//! # Ok::<(), SkirmishError>(())
//! ```

pub mod commands;
pub mod config;
pub mod game_loop;
pub mod reactor;
pub mod server;

mod error;

pub use config::ServerConfig;
pub use error::SkirmishError;
pub use server::{SkirmishServer, SkirmishServerBuilder};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{ServerConfig, SkirmishError, SkirmishServer, SkirmishServerBuilder};

    pub use skirmish_persistence::{
        Cache, Database, MemoryCache, MemoryDatabase, PersistenceConfig,
    };
    pub use skirmish_protocol::{PacketId, Request, Response, RoomId, SessionId};
    pub use skirmish_room::RoomConfig;
    pub use skirmish_tick::TickPolicy;
}
