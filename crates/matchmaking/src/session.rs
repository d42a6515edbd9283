//! Session identity, settings and the record of a hosted session.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known slot name reserved for "the game session".
///
/// Invite acceptance always joins into this slot.
pub const GAME_SESSION_NAME: &str = "Game";

/// Advertised settings key carrying the map name.
pub const MAP_NAME_KEY: &str = "MAPNAME";

/// Opaque platform identity of a local user.
///
/// The nil UUID stands for "no identity" and is rejected by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Name a session is tracked by, both locally and by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved game-session slot.
    pub fn game() -> Self {
        Self::new(GAME_SESSION_NAME)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Value stored under an advertised settings key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Where an advertised setting is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertisementType {
    DontAdvertise,
    ViaPingOnly,
    ViaOnlineService,
    ViaOnlineServiceAndPing,
}

/// A single advertised key/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertisedSetting {
    pub value: SettingValue,
    pub advertisement: AdvertisementType,
}

/// Configuration snapshot handed to the backend with a create request.
///
/// Built once per create and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub is_lan_match: bool,
    pub uses_presence: bool,
    pub num_public_connections: u32,
    pub num_private_connections: u32,
    pub allow_invites: bool,
    pub allow_join_in_progress: bool,
    pub should_advertise: bool,
    pub allow_join_via_presence: bool,
    pub allow_join_via_presence_friends_only: bool,
    pub settings: BTreeMap<String, AdvertisedSetting>,
}

impl SessionSettings {
    /// Settings for a newly hosted session.
    ///
    /// Invites, join-in-progress, advertising and join-via-presence (for
    /// anyone) are always on. A non-empty `map_name` is advertised under
    /// [`MAP_NAME_KEY`] via the online service.
    pub fn hosted(is_lan: bool, uses_presence: bool, max_players: u32, map_name: &str) -> Self {
        let mut settings = BTreeMap::new();
        if !map_name.is_empty() {
            settings.insert(
                MAP_NAME_KEY.to_owned(),
                AdvertisedSetting {
                    value: SettingValue::from(map_name),
                    advertisement: AdvertisementType::ViaOnlineService,
                },
            );
        }

        Self {
            is_lan_match: is_lan,
            uses_presence,
            num_public_connections: max_players,
            num_private_connections: 0,
            allow_invites: true,
            allow_join_in_progress: true,
            should_advertise: true,
            allow_join_via_presence: true,
            allow_join_via_presence_friends_only: false,
            settings,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key).map(|entry| &entry.value)
    }

    pub fn map_name(&self) -> Option<&str> {
        match self.get(MAP_NAME_KEY) {
            Some(SettingValue::Text(map)) => Some(map.as_str()),
            _ => None,
        }
    }
}

/// One session attempt as seen by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub name: SessionName,
    pub owner: UserId,
    pub settings: SessionSettings,
}

impl SessionHandle {
    pub fn new(name: SessionName, owner: UserId, settings: SessionSettings) -> Self {
        Self {
            name,
            owner,
            settings,
        }
    }

    pub fn map_name(&self) -> Option<&str> {
        self.settings.map_name()
    }
}

/// Record of the session this process currently hosts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_name: Option<SessionName>,
    pub entry_map_name: String,
    pub game_map_name: String,
}

impl SessionInfo {
    pub fn hosted(name: SessionName, entry_map: &str, game_map: &str) -> Self {
        Self {
            session_name: Some(name),
            entry_map_name: entry_map.to_owned(),
            game_map_name: game_map.to_owned(),
        }
    }

    pub fn is_hosting(&self, name: &SessionName) -> bool {
        self.session_name.as_ref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosted_settings_defaults() {
        let settings = SessionSettings::hosted(true, false, 8, "");
        assert!(settings.is_lan_match);
        assert!(!settings.uses_presence);
        assert_eq!(settings.num_public_connections, 8);
        assert_eq!(settings.num_private_connections, 0);
        assert!(settings.allow_invites);
        assert!(settings.allow_join_in_progress);
        assert!(settings.should_advertise);
        assert!(settings.allow_join_via_presence);
        assert!(!settings.allow_join_via_presence_friends_only);
        assert!(settings.settings.is_empty());
        assert_eq!(settings.map_name(), None);
    }

    #[test]
    fn test_map_name_is_advertised_via_online_service() {
        let settings = SessionSettings::hosted(false, true, 4, "Highlands");
        let entry = settings.settings.get(MAP_NAME_KEY).unwrap();
        assert_eq!(entry.value, SettingValue::Text("Highlands".into()));
        assert_eq!(entry.advertisement, AdvertisementType::ViaOnlineService);
        assert_eq!(settings.map_name(), Some("Highlands"));
    }

    #[test]
    fn test_identity_and_name_validity() {
        assert!(!UserId::nil().is_valid());
        assert!(UserId::new().is_valid());
        assert!(!SessionName::new("").is_valid());
        assert!(!SessionName::new("   ").is_valid());
        assert!(SessionName::game().is_valid());
        assert_eq!(SessionName::game().as_str(), GAME_SESSION_NAME);
    }
}
