//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every room the manager creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum players allowed in one room.
    pub max_players: usize,

    /// Title prefix for rooms created implicitly by entering an unknown id.
    /// The room id is appended ("Room 7").
    pub default_title: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 64,
            default_title: "Room".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_players, 64);
        assert_eq!(config.default_title, "Room");
    }

    #[test]
    fn test_room_config_partial_json_keeps_defaults() {
        let config: RoomConfig = serde_json::from_str(r#"{"max_players": 2}"#).unwrap();
        assert_eq!(config.max_players, 2);
        assert_eq!(config.default_title, "Room");
    }
}
