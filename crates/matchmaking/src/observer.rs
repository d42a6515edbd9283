//! Terminal outcomes of coordinator operations and the sinks receiving them.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::{
    backend::{Friend, JoinSessionResult, OperationKind},
    error::MatchmakingError,
    search::SearchResult,
    session::SessionName,
};

/// Caller-supplied receiver of terminal outcomes.
///
/// All delivery happens on the coordinator's thread; there are no return
/// values.
pub trait SessionObserver {
    /// Create and start both finished (or one of them failed).
    fn on_session_ready(&mut self, name: &SessionName, ok: bool);
    fn on_search_complete(&mut self, results: &[SearchResult], ok: bool);
    fn on_join_result(&mut self, name: &SessionName, result: JoinSessionResult);
    fn on_session_destroyed(&mut self, name: &SessionName, ok: bool);
    fn on_friends_list_ready(&mut self, friends: &[Friend], ok: bool);
}

/// Owned form of every observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingEvent {
    SessionReady {
        name: SessionName,
        ok: bool,
    },
    SearchComplete {
        results: Vec<SearchResult>,
        ok: bool,
    },
    JoinResult {
        name: SessionName,
        result: JoinSessionResult,
    },
    SessionDestroyed {
        name: SessionName,
        ok: bool,
    },
    FriendsListReady {
        friends: Vec<Friend>,
        ok: bool,
    },
}

impl MatchmakingEvent {
    /// The failure this event reports, if any.
    pub fn error(&self) -> Option<MatchmakingError> {
        match self {
            MatchmakingEvent::SessionReady { ok: false, .. } => {
                Some(MatchmakingError::AsyncFailure(OperationKind::CreateSession))
            }
            MatchmakingEvent::SearchComplete { ok: false, .. } => {
                Some(MatchmakingError::AsyncFailure(OperationKind::FindSessions))
            }
            MatchmakingEvent::JoinResult { result, .. } if !result.is_success() => {
                Some(MatchmakingError::JoinRejected(*result))
            }
            MatchmakingEvent::SessionDestroyed { ok: false, .. } => {
                Some(MatchmakingError::AsyncFailure(OperationKind::DestroySession))
            }
            MatchmakingEvent::FriendsListReady { ok: false, .. } => {
                Some(MatchmakingError::AsyncFailure(OperationKind::ReadFriendsList))
            }
            _ => None,
        }
    }
}

/// Collects every outcome in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Vec<MatchmakingEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[MatchmakingEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<MatchmakingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn last(&self) -> Option<&MatchmakingEvent> {
        self.events.last()
    }

    /// Number of search-complete notifications seen so far.
    pub fn search_completions(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, MatchmakingEvent::SearchComplete { .. }))
            .count()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_session_ready(&mut self, name: &SessionName, ok: bool) {
        self.events.push(MatchmakingEvent::SessionReady {
            name: name.clone(),
            ok,
        });
    }

    fn on_search_complete(&mut self, results: &[SearchResult], ok: bool) {
        self.events.push(MatchmakingEvent::SearchComplete {
            results: results.to_vec(),
            ok,
        });
    }

    fn on_join_result(&mut self, name: &SessionName, result: JoinSessionResult) {
        self.events.push(MatchmakingEvent::JoinResult {
            name: name.clone(),
            result,
        });
    }

    fn on_session_destroyed(&mut self, name: &SessionName, ok: bool) {
        self.events.push(MatchmakingEvent::SessionDestroyed {
            name: name.clone(),
            ok,
        });
    }

    fn on_friends_list_ready(&mut self, friends: &[Friend], ok: bool) {
        self.events.push(MatchmakingEvent::FriendsListReady {
            friends: friends.to_vec(),
            ok,
        });
    }
}

/// Forwards outcomes to whoever owns the receiving half (game loop, UI).
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: UnboundedSender<MatchmakingEvent>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<MatchmakingEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, UnboundedReceiver<MatchmakingEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }

    fn send(&self, event: MatchmakingEvent) {
        if self.sender.send(event).is_err() {
            warn!(
                target: "matchmaking::observer",
                "matchmaking event dropped: receiver closed"
            );
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_session_ready(&mut self, name: &SessionName, ok: bool) {
        self.send(MatchmakingEvent::SessionReady {
            name: name.clone(),
            ok,
        });
    }

    fn on_search_complete(&mut self, results: &[SearchResult], ok: bool) {
        self.send(MatchmakingEvent::SearchComplete {
            results: results.to_vec(),
            ok,
        });
    }

    fn on_join_result(&mut self, name: &SessionName, result: JoinSessionResult) {
        self.send(MatchmakingEvent::JoinResult {
            name: name.clone(),
            result,
        });
    }

    fn on_session_destroyed(&mut self, name: &SessionName, ok: bool) {
        self.send(MatchmakingEvent::SessionDestroyed {
            name: name.clone(),
            ok,
        });
    }

    fn on_friends_list_ready(&mut self, friends: &[Friend], ok: bool) {
        self.send(MatchmakingEvent::FriendsListReady {
            friends: friends.to_vec(),
            ok,
        });
    }
}

/// Reports outcomes as tracing events only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_session_ready(&mut self, name: &SessionName, ok: bool) {
        info!(target: "matchmaking::observer", session = %name, ok, "session ready");
    }

    fn on_search_complete(&mut self, results: &[SearchResult], ok: bool) {
        info!(
            target: "matchmaking::observer",
            count = results.len(),
            ok,
            "search complete"
        );
        for (index, result) in results.iter().enumerate() {
            info!(
                target: "matchmaking::observer",
                "session number: {} | owner: {} | ping: {}ms",
                index + 1,
                result.owning_user_name,
                result.ping_ms
            );
        }
    }

    fn on_join_result(&mut self, name: &SessionName, result: JoinSessionResult) {
        info!(target: "matchmaking::observer", session = %name, %result, "join result");
    }

    fn on_session_destroyed(&mut self, name: &SessionName, ok: bool) {
        info!(target: "matchmaking::observer", session = %name, ok, "session destroyed");
    }

    fn on_friends_list_ready(&mut self, friends: &[Friend], ok: bool) {
        info!(
            target: "matchmaking::observer",
            count = friends.len(),
            ok,
            "friends list ready"
        );
    }
}
