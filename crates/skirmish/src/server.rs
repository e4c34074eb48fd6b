//! `SkirmishServer` builder and lifecycle.
//!
//! Ties the layers together:
//!
//! ```text
//!   accept loop ──▶ Session ──▶ command queue ──▶ game loop ──▶ RoomManager
//!        │             ▲                              │
//!     TcpLink ──▶ CompletionPort ──▶ reactor pool     └──▶ PersistenceGateway
//! ```
//!
//! [`start`](SkirmishServerBuilder::start) brings everything up and returns
//! once the listener is bound. [`shutdown`](SkirmishServer::shutdown) tears
//! it down in dependency order: stop accepting, close every session, stop
//! the game loop once it has run the resulting logouts, stop the reactor,
//! drain persistence, then drop the runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use skirmish_persistence::{Cache, Database, MemoryCache, MemoryDatabase, PersistenceGateway};
use skirmish_room::RoomManager;
use skirmish_session::{CommandSender, Session, SessionDirectory, command_queue};
use skirmish_transport::{CompletionPort, CompletionSender, TcpLink, TcpTransport};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::SkirmishError;
use crate::commands::{DirectorySink, GameContext};
use crate::config::ServerConfig;
use crate::game_loop::GameLoop;
use crate::reactor::ReactorPool;

/// Builder for configuring and starting a Skirmish server.
///
/// # Example
///
/// ```rust,ignore
/// use skirmish::prelude::*;
///
/// let server = SkirmishServer::builder()
///     .bind("0.0.0.0:9190")
///     .database(Arc::new(my_db))
///     .start()?;
/// server.run_until_ctrl_c()
/// ```
///
/// Without a database or cache the in-memory implementations are used.
pub struct SkirmishServerBuilder {
    config: ServerConfig,
    database: Option<Arc<dyn Database>>,
    cache: Option<Arc<dyn Cache>>,
}

impl SkirmishServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            database: None,
            cache: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Starts every component and binds the listener.
    ///
    /// Must not be called from inside an async runtime: the server owns its
    /// own.
    ///
    /// # Errors
    /// - [`SkirmishError::Io`] if the runtime or a thread cannot start.
    /// - [`SkirmishError::Transport`] if the address cannot be bound.
    /// - [`SkirmishError::Persistence`] if the database cannot be reached.
    pub fn start(self) -> Result<SkirmishServer, SkirmishError> {
        let config = self.config;
        let database = self
            .database
            .unwrap_or_else(|| Arc::new(MemoryDatabase::new()));
        let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new()));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads.max(1))
            .thread_name("skirmish-io")
            .enable_all()
            .build()?;
        let transport = runtime.block_on(TcpTransport::bind(&config.bind_addr))?;
        let local_addr = transport.local_addr()?;

        let directory = Arc::new(SessionDirectory::new());
        let persistence = Arc::new(PersistenceGateway::start(
            database,
            cache,
            config.persistence.clone(),
            Arc::new(DirectorySink::new(Arc::clone(&directory))),
        )?);
        let ctx = GameContext {
            rooms: Arc::new(RoomManager::new(config.room.clone())),
            persistence: Arc::clone(&persistence),
            directory: Arc::clone(&directory),
        };

        let port = CompletionPort::new();
        let reactor = ReactorPool::start(
            config.reactor_threads,
            &port,
            Arc::clone(&directory),
            config.tolerate_malformed_login,
        )?;

        let (commands, command_rx) = command_queue();
        let game_loop = GameLoop::spawn(ctx, command_rx, config.tick_config())?;

        let (accept_stop, accept_stop_rx) = watch::channel(false);
        let acceptor = Acceptor {
            transport,
            directory: Arc::clone(&directory),
            completions: port.sender(),
            commands,
        };
        let accept_task = runtime.spawn(acceptor.run(accept_stop_rx));

        tracing::info!(addr = %local_addr, "skirmish server listening");
        Ok(SkirmishServer {
            runtime: Some(runtime),
            local_addr,
            accept_stop,
            accept_task: Some(accept_task),
            game_loop,
            reactor,
            persistence,
            directory,
        })
    }
}

impl Default for SkirmishServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running server. Dropping it shuts it down.
pub struct SkirmishServer {
    runtime: Option<Runtime>,
    local_addr: SocketAddr,
    accept_stop: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    game_loop: GameLoop,
    reactor: ReactorPool,
    persistence: Arc<PersistenceGateway>,
    directory: Arc<SessionDirectory>,
}

impl SkirmishServer {
    pub fn builder() -> SkirmishServerBuilder {
        SkirmishServerBuilder::new()
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connected sessions.
    pub fn session_count(&self) -> usize {
        self.directory.len()
    }

    /// Blocks until Ctrl-C, then shuts down.
    ///
    /// # Errors
    /// Returns [`SkirmishError::Io`] if the signal handler cannot be
    /// installed. The server is shut down either way.
    pub fn run_until_ctrl_c(mut self) -> Result<(), SkirmishError> {
        let signal = match &self.runtime {
            Some(runtime) => runtime.block_on(tokio::signal::ctrl_c()),
            None => Ok(()),
        };
        tracing::info!("shutdown requested");
        self.shutdown();
        signal.map_err(SkirmishError::from)
    }

    /// Stops every component in order. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        self.accept_stop.send_replace(true);
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = runtime.block_on(task) {
                tracing::error!(error = %e, "accept loop failed");
            }
        }

        // Closing sessions queues their Logouts; the game loop's final drain
        // runs them, so presence is released before persistence stops.
        let closed = self.directory.disconnect_all();
        self.game_loop.stop();
        self.reactor.stop();
        self.persistence.stop();
        runtime.shutdown_timeout(Duration::from_secs(1));

        tracing::info!(sessions_closed = closed, "skirmish server stopped");
    }
}

impl Drop for SkirmishServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Accept loop
// ---------------------------------------------------------------------------

struct Acceptor {
    transport: TcpTransport,
    directory: Arc<SessionDirectory>,
    completions: CompletionSender,
    commands: CommandSender,
}

impl Acceptor {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                accepted = self.transport.accept() => match accepted {
                    Ok((stream, addr)) => self.open_session(stream, addr),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }
        tracing::debug!("accept loop stopped");
    }

    fn open_session(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        let id = self.directory.allocate_id();
        let link = TcpLink::new(
            id,
            stream,
            self.completions.clone(),
            tokio::runtime::Handle::current(),
        );
        let session = Arc::new(Session::new(id, Box::new(link), self.commands.clone()));
        self.directory.insert(Arc::clone(&session));
        session.start();
        tracing::info!(session_id = %id, peer = %addr, "client connected");
    }
}
