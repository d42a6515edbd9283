//! Konfiguration des Matchmakings (TOML).
//!
//! Fehlende Abschnitte fallen auf die Standardwerte zurück; die Standardwerte
//! entsprechen den fest verdrahteten Werten des Koordinators.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    search::{SearchQuery, DEFAULT_MAX_SEARCH_RESULTS, DEFAULT_PING_BUCKET_SIZE},
    session::{SessionName, GAME_SESSION_NAME},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub search: SearchConfig,
    pub session: SessionConfig,
    pub friends: FriendsConfig,
}

impl MatchmakingConfig {
    /// Lädt die Konfiguration aus einer TOML-Datei.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_results == 0 {
            return Err(ConfigError::Invalid(
                "search.max_results must be greater than 0".into(),
            ));
        }
        if self.search.ping_bucket_size == 0 {
            return Err(ConfigError::Invalid(
                "search.ping_bucket_size must be greater than 0".into(),
            ));
        }
        if !self.session.game_session_name().is_valid() {
            return Err(ConfigError::Invalid(
                "session.game_session_name must not be blank".into(),
            ));
        }
        if self.session.default_max_players == 0 {
            return Err(ConfigError::Invalid(
                "session.default_max_players must be greater than 0".into(),
            ));
        }
        if self.friends.default_list.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "friends.default_list must not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// Parameter für Session-Suchen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    pub ping_bucket_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_SEARCH_RESULTS,
            ping_bucket_size: DEFAULT_PING_BUCKET_SIZE,
        }
    }
}

impl SearchConfig {
    /// Baut eine neue Suchanfrage; Presence-Filter nur wenn angefragt.
    pub fn query(&self, is_lan: bool, is_presence: bool) -> SearchQuery {
        let mut query = SearchQuery::sessions(is_lan, is_presence);
        query.max_search_results = self.max_results;
        query.ping_bucket_size = self.ping_bucket_size;
        query
    }
}

/// Parameter für gehostete Sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Slot, in den angenommene Einladungen beitreten.
    pub game_session_name: String,
    pub default_max_players: u32,
    /// Map, auf der Spieler vor dem Spielstart landen.
    pub entry_map: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_session_name: GAME_SESSION_NAME.into(),
            default_max_players: 4,
            entry_map: String::new(),
        }
    }
}

impl SessionConfig {
    pub fn game_session_name(&self) -> SessionName {
        SessionName::new(self.game_session_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendsConfig {
    pub default_list: String,
}

impl Default for FriendsConfig {
    fn default() -> Self {
        Self {
            default_list: "default".into(),
        }
    }
}
