//! Session matchmaking coordinator.
//!
//! Drives the create → start → find → join → destroy lifecycle of online
//! game sessions against an asynchronous [`MatchmakingBackend`], tracks one
//! completion delegate per in-flight request, and reports terminal outcomes
//! to a [`SessionObserver`]. The optional `bevy` feature hooks the
//! coordinator into an ECS app.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loopback;
pub mod observer;
pub mod search;
pub mod session;

#[cfg(feature = "bevy")]
pub mod bevy;

pub use backend::{
    BackendCompletion, Friend, FriendsBackend, FriendsCompletion, JoinSessionResult,
    MatchmakingBackend, NoopFriends, OperationKind, RegistrationToken,
};
pub use config::{ConfigError, FriendsConfig, MatchmakingConfig, SearchConfig, SessionConfig};
pub use coordinator::{PendingOperation, SessionCoordinator};
pub use error::{FriendsError, MatchmakingError};
pub use loopback::{LoopbackFriends, LoopbackMatchmaking, LoopbackService};
pub use observer::{
    ChannelObserver, LoggingObserver, MatchmakingEvent, RecordingObserver, SessionObserver,
};
pub use search::{
    ComparisonOp, QuerySetting, SearchQuery, SearchResult, SessionId, DEFAULT_MAX_SEARCH_RESULTS,
    DEFAULT_PING_BUCKET_SIZE, SEARCH_PRESENCE,
};
pub use session::{
    AdvertisedSetting, AdvertisementType, SessionHandle, SessionInfo, SessionName,
    SessionSettings, SettingValue, UserId, GAME_SESSION_NAME, MAP_NAME_KEY,
};
