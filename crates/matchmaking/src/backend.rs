//! Seams towards the host's online services.
//!
//! A backend performs requests out of core and later produces exactly one
//! completion per accepted request. Completions are queued by the backend and
//! drained by the host through `poll_completions`; the coordinator never gets
//! called back re-entrantly from inside a request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::FriendsError,
    search::{SearchQuery, SearchResult},
    session::{SessionName, SessionSettings, UserId},
};

/// Operation families that carry their own completion delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    CreateSession,
    StartSession,
    FindSessions,
    JoinSession,
    DestroySession,
    ReadFriendsList,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::CreateSession => "create session",
            OperationKind::StartSession => "start session",
            OperationKind::FindSessions => "find sessions",
            OperationKind::JoinSession => "join session",
            OperationKind::DestroySession => "destroy session",
            OperationKind::ReadFriendsList => "read friends list",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle a backend issues when a completion delegate is added.
///
/// Not `Clone`: clearing consumes the token, so a registration can only be
/// released once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RegistrationToken {
    kind: OperationKind,
    id: u64,
}

impl RegistrationToken {
    pub const fn new(kind: OperationKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Outcome codes of a join completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinSessionResult {
    Success,
    SessionIsFull,
    SessionDoesNotExist,
    CouldNotRetrieveAddress,
    AlreadyInSession,
    UnknownError,
}

impl JoinSessionResult {
    pub const fn is_success(self) -> bool {
        matches!(self, JoinSessionResult::Success)
    }
}

impl fmt::Display for JoinSessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JoinSessionResult::Success => "success",
            JoinSessionResult::SessionIsFull => "session is full",
            JoinSessionResult::SessionDoesNotExist => "session does not exist",
            JoinSessionResult::CouldNotRetrieveAddress => "could not retrieve address",
            JoinSessionResult::AlreadyInSession => "already in session",
            JoinSessionResult::UnknownError => "unknown error",
        };
        f.write_str(text)
    }
}

/// Completion notifications produced by a [`MatchmakingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCompletion {
    CreateSession {
        name: SessionName,
        success: bool,
    },
    StartSession {
        name: SessionName,
        success: bool,
    },
    FindSessions {
        success: bool,
        results: Vec<SearchResult>,
    },
    JoinSession {
        name: SessionName,
        result: JoinSessionResult,
    },
    DestroySession {
        name: SessionName,
        success: bool,
    },
    /// Unsolicited: a platform invite was accepted outside the game.
    InviteAccepted {
        success: bool,
        user: UserId,
        result: SearchResult,
    },
}

/// Session half of the host's online services.
pub trait MatchmakingBackend {
    /// Whether the online subsystem can be reached at all.
    fn is_available(&self) -> bool;

    fn add_completion_delegate(&mut self, kind: OperationKind) -> RegistrationToken;
    fn clear_completion_delegate(&mut self, token: RegistrationToken);

    /// Returns whether the request was accepted; the outcome arrives later.
    fn create_session(
        &mut self,
        user: UserId,
        name: &SessionName,
        settings: &SessionSettings,
    ) -> bool;
    fn start_session(&mut self, name: &SessionName) -> bool;
    fn find_sessions(&mut self, user: UserId, query: &SearchQuery);
    fn join_session(&mut self, user: UserId, name: &SessionName, result: &SearchResult) -> bool;
    fn destroy_session(&mut self, name: &SessionName) -> bool;

    /// Moves queued completions into `output`, in the order they happened.
    fn poll_completions(&mut self, output: &mut Vec<BackendCompletion>);
}

/// Entry of a friends list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub user: UserId,
    pub display_name: String,
    pub online: bool,
}

impl Friend {
    pub fn new(user: UserId, display_name: impl Into<String>, online: bool) -> Self {
        Self {
            user,
            display_name: display_name.into(),
            online,
        }
    }
}

/// Completion notifications produced by a [`FriendsBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendsCompletion {
    ReadFriendsList {
        local_user: u32,
        success: bool,
        list_name: String,
        error: String,
    },
}

/// Friends half of the host's online services.
pub trait FriendsBackend {
    fn is_available(&self) -> bool;

    fn add_read_delegate(&mut self) -> RegistrationToken;
    fn clear_read_delegate(&mut self, token: RegistrationToken);

    /// Starts reading `list_name` for `local_user`; returns whether the read
    /// was accepted.
    fn read_friends_list(&mut self, local_user: u32, list_name: &str) -> bool;

    /// Returns the list cached by the last successful read.
    fn get_friends_list(&self, local_user: u32, list_name: &str)
        -> Result<Vec<Friend>, FriendsError>;

    fn poll_completions(&mut self, output: &mut Vec<FriendsCompletion>);
}

/// Placeholder friends backend for hosts without a friends service.
#[derive(Debug, Default)]
pub struct NoopFriends {
    next_token: u64,
}

impl FriendsBackend for NoopFriends {
    fn is_available(&self) -> bool {
        false
    }

    fn add_read_delegate(&mut self) -> RegistrationToken {
        self.next_token += 1;
        RegistrationToken::new(OperationKind::ReadFriendsList, self.next_token)
    }

    fn clear_read_delegate(&mut self, _token: RegistrationToken) {}

    fn read_friends_list(&mut self, _local_user: u32, _list_name: &str) -> bool {
        false
    }

    fn get_friends_list(
        &self,
        _local_user: u32,
        _list_name: &str,
    ) -> Result<Vec<Friend>, FriendsError> {
        Err(FriendsError::Unavailable)
    }

    fn poll_completions(&mut self, _output: &mut Vec<FriendsCompletion>) {}
}
