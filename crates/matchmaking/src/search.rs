//! Search queries and the descriptors a find operation produces.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{SessionSettings, SettingValue, UserId};

/// Query key filtering for presence-enabled sessions.
pub const SEARCH_PRESENCE: &str = "PRESENCESEARCH";

/// Default cap on results kept from one find.
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 20;

/// Default ping bucket size in milliseconds.
pub const DEFAULT_PING_BUCKET_SIZE: u32 = 50;

/// Backend-side identifier of a discovered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(Uuid::nil())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Comparison applied to a query setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
}

impl ComparisonOp {
    pub fn matches(self, actual: &SettingValue, expected: &SettingValue) -> bool {
        match self {
            ComparisonOp::Equals => actual == expected,
            ComparisonOp::NotEquals => actual != expected,
            ComparisonOp::GreaterThan => match (actual, expected) {
                (SettingValue::Int(a), SettingValue::Int(b)) => a > b,
                _ => false,
            },
            ComparisonOp::LessThan => match (actual, expected) {
                (SettingValue::Int(a), SettingValue::Int(b)) => a < b,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySetting {
    pub value: SettingValue,
    pub op: ComparisonOp,
}

/// Parameters of one find operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub is_lan_query: bool,
    pub max_search_results: usize,
    pub ping_bucket_size: u32,
    pub query_settings: BTreeMap<String, QuerySetting>,
}

impl SearchQuery {
    pub fn new(is_lan: bool, max_search_results: usize, ping_bucket_size: u32) -> Self {
        Self {
            is_lan_query: is_lan,
            max_search_results,
            ping_bucket_size,
            query_settings: BTreeMap::new(),
        }
    }

    /// Query with the default cap and ping bucket. The presence filter is
    /// only added when `is_presence` is set.
    pub fn sessions(is_lan: bool, is_presence: bool) -> Self {
        let mut query = Self::new(is_lan, DEFAULT_MAX_SEARCH_RESULTS, DEFAULT_PING_BUCKET_SIZE);
        if is_presence {
            query.set(SEARCH_PRESENCE, true, ComparisonOp::Equals);
        }
        query
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>, op: ComparisonOp) {
        self.query_settings.insert(
            key.into(),
            QuerySetting {
                value: value.into(),
                op,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&QuerySetting> {
        self.query_settings.get(key)
    }

    pub fn is_presence_query(&self) -> bool {
        matches!(
            self.get(SEARCH_PRESENCE),
            Some(QuerySetting {
                value: SettingValue::Bool(true),
                op: ComparisonOp::Equals,
            })
        )
    }
}

/// Opaque descriptor of a discovered session; usable as a join target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub session_id: SessionId,
    pub owning_user: UserId,
    pub owning_user_name: String,
    pub ping_ms: u32,
    pub open_public_connections: u32,
    pub settings: SessionSettings,
}

impl SearchResult {
    /// A result is only usable with a real session id and a real owner.
    pub fn is_valid(&self) -> bool {
        self.session_id.is_valid() && self.owning_user.is_valid()
    }

    pub fn is_full(&self) -> bool {
        self.open_public_connections == 0
    }

    pub fn map_name(&self) -> Option<&str> {
        self.settings.map_name()
    }

    /// Ping rounded down to its bucket; results with equal buckets are
    /// considered equally close.
    pub fn ping_bucket(&self, bucket_size: u32) -> u32 {
        if bucket_size == 0 {
            return self.ping_ms;
        }
        (self.ping_ms / bucket_size) * bucket_size
    }
}
