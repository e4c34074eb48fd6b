//! Server configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "bind_addr": "127.0.0.1:7000", "persistence": { "workers": 4 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_persistence::PersistenceConfig;
use skirmish_room::RoomConfig;
use skirmish_tick::{TickConfig, TickPolicy};

use crate::SkirmishError;

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_addr: String,

    /// Tokio worker threads driving socket I/O.
    pub io_threads: usize,

    /// Threads dispatching I/O completions to sessions.
    pub reactor_threads: usize,

    /// Simulation ticks per second.
    pub tick_rate_hz: u32,

    /// What the game loop does when it falls behind.
    pub tick_policy: TickPolicy,

    /// Step over a Login packet whose body is too short instead of dropping
    /// the connection. Other malformed packets always disconnect.
    pub tolerate_malformed_login: bool,

    pub persistence: PersistenceConfig,

    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9190".to_string(),
            io_threads: 4,
            reactor_threads: 4,
            tick_rate_hz: 60,
            tick_policy: TickPolicy::Skip,
            tolerate_malformed_login: true,
            persistence: PersistenceConfig::default(),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a JSON config.
    ///
    /// # Errors
    /// Returns [`SkirmishError::Config`] on malformed JSON or wrong types.
    pub fn from_json(json: &str) -> Result<Self, SkirmishError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    /// [`SkirmishError::Io`] if the file cannot be read,
    /// [`SkirmishError::Config`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SkirmishError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn io_threads(mut self, n: usize) -> Self {
        self.io_threads = n;
        self
    }

    pub fn reactor_threads(mut self, n: usize) -> Self {
        self.reactor_threads = n;
        self
    }

    pub fn tick_rate_hz(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    pub fn tolerate_malformed_login(mut self, tolerate: bool) -> Self {
        self.tolerate_malformed_login = tolerate;
        self
    }

    pub fn persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn room(mut self, room: RoomConfig) -> Self {
        self.room = room;
        self
    }

    /// Scheduler settings derived from this config.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate_hz: self.tick_rate_hz,
            policy: self.tick_policy,
            ..TickConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:9190");
        assert_eq!(config.reactor_threads, 4);
        assert_eq!(config.tick_rate_hz, 60);
        assert!(config.tolerate_malformed_login);
        assert_eq!(config.persistence.workers, 2);
        assert_eq!(config.room.max_players, 64);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ServerConfig::from_json(
            r#"{"bind_addr": "127.0.0.1:7000", "persistence": {"workers": 4}, "tick_policy": "drop"}"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.persistence.workers, 4);
        assert_eq!(config.persistence.chat_history_len, 50);
        assert_eq!(config.tick_policy, TickPolicy::Drop);
        assert_eq!(config.io_threads, 4);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ServerConfig::from_json(r#"{"io_threads": "many"}"#).unwrap_err();
        assert!(matches!(err, SkirmishError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ServerConfig::load("/nonexistent/skirmish.json").unwrap_err();
        assert!(matches!(err, SkirmishError::Io(_)));
    }

    #[test]
    fn test_builder_methods_and_tick_config() {
        let config = ServerConfig::default()
            .bind("127.0.0.1:0")
            .reactor_threads(2)
            .tick_rate_hz(30)
            .tolerate_malformed_login(false);
        assert_eq!(config.bind_addr, "127.0.0.1:0");
        assert_eq!(config.reactor_threads, 2);
        assert!(!config.tolerate_malformed_login);

        let tick = config.tick_config();
        assert_eq!(tick.tick_rate_hz, 30);
        assert_eq!(tick.policy, TickPolicy::Skip);
    }
}
