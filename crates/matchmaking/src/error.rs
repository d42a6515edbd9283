use thiserror::Error;

use crate::backend::{JoinSessionResult, OperationKind};

/// Errors reported synchronously by the coordinator.
///
/// Once a request has been accepted by the backend, failures only arrive
/// through the completion path and are reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    #[error("matchmaking backend unavailable")]
    BackendUnavailable,

    #[error("invalid user identity")]
    InvalidIdentity,

    #[error("invalid session name: {0:?}")]
    InvalidSessionName(String),

    #[error("search result is not valid")]
    SearchInvalid,

    #[error("join rejected: {0}")]
    JoinRejected(JoinSessionResult),

    #[error("{0} failed asynchronously")]
    AsyncFailure(OperationKind),

    #[error("{0} already pending")]
    OperationPending(OperationKind),

    #[error("backend refused {0}")]
    BackendRejected(OperationKind),
}

/// Errors raised by a friends backend when querying a cached list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FriendsError {
    #[error("friends backend unavailable")]
    Unavailable,

    #[error("friends list {list:?} not read for local user {local_user}")]
    ListNotRead { local_user: u32, list: String },
}
