//! Loopback matchmaking for in-process play.
//!
//! A [`LoopbackService`] plays the role of the online service: it keeps the
//! list of advertised sessions shared by every endpoint created from it. Each
//! [`LoopbackMatchmaking`] endpoint is one local player's view of that
//! service, with its own delegate registrations, local session slots and
//! completion queue. Nothing touches the network stack; this is used for
//! singleplayer/local runs and as the backend of the test suites.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use tracing::{debug, warn};

use crate::{
    backend::{
        BackendCompletion, Friend, FriendsBackend, FriendsCompletion, JoinSessionResult,
        MatchmakingBackend, OperationKind, RegistrationToken,
    },
    error::FriendsError,
    search::{SearchQuery, SearchResult, SessionId, SEARCH_PRESENCE},
    session::{SessionName, SessionSettings, UserId},
};

/// Ping reported for loopback sessions unless an endpoint overrides it.
const LOOPBACK_PING_MS: u32 = 1;

#[derive(Debug)]
struct AdvertisedSession {
    id: SessionId,
    owner: UserId,
    owner_name: String,
    settings: SessionSettings,
    started: bool,
    players: Vec<UserId>,
    ping_ms: u32,
}

impl AdvertisedSession {
    fn open_connections(&self) -> u32 {
        let taken = u32::try_from(self.players.len()).unwrap_or(u32::MAX);
        self.settings.num_public_connections.saturating_sub(taken)
    }

    fn to_search_result(&self) -> SearchResult {
        SearchResult {
            session_id: self.id,
            owning_user: self.owner,
            owning_user_name: self.owner_name.clone(),
            ping_ms: self.ping_ms,
            open_public_connections: self.open_connections(),
            settings: self.settings.clone(),
        }
    }

    fn matches(&self, user: UserId, query: &SearchQuery) -> bool {
        if !self.settings.should_advertise || self.owner == user {
            return false;
        }
        if self.settings.is_lan_match != query.is_lan_query {
            return false;
        }
        if query.is_presence_query() && !self.settings.uses_presence {
            return false;
        }
        query
            .query_settings
            .iter()
            .filter(|(key, _)| key.as_str() != SEARCH_PRESENCE)
            .all(|(key, setting)| {
                self.settings
                    .get(key)
                    .is_some_and(|actual| setting.op.matches(actual, &setting.value))
            })
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    sessions: Vec<AdvertisedSession>,
}

/// Shared in-memory "online service".
#[derive(Debug, Clone, Default)]
pub struct LoopbackService {
    state: Arc<Mutex<ServiceState>>,
}

impl LoopbackService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new local player's view of this service.
    pub fn endpoint(&self, display_name: impl Into<String>) -> LoopbackMatchmaking {
        LoopbackMatchmaking::new(self.clone(), display_name.into())
    }

    /// Number of sessions currently advertised.
    pub fn session_count(&self) -> usize {
        self.with_state(|state| state.sessions.len()).unwrap_or(0)
    }

    /// Number of players (host included) in the session `id`.
    pub fn player_count(&self, id: SessionId) -> Option<usize> {
        self.with_state(|state| {
            state
                .sessions
                .iter()
                .find(|session| session.id == id)
                .map(|session| session.players.len())
        })
        .flatten()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ServiceState) -> R) -> Option<R> {
        match self.state.lock() {
            Ok(mut state) => Some(f(&mut state)),
            Err(_) => {
                warn!(target: "matchmaking::loopback", "loopback service state poisoned");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalSlot {
    Hosted(SessionId),
    Joined { id: SessionId, user: UserId },
}

/// One player's endpoint on a [`LoopbackService`].
#[derive(Debug)]
pub struct LoopbackMatchmaking {
    service: LoopbackService,
    display_name: String,
    available: bool,
    ping_ms: u32,
    next_token: u64,
    delegates: HashMap<u64, OperationKind>,
    registrations_added: usize,
    registrations_cleared: usize,
    calls: BTreeMap<OperationKind, usize>,
    slots: HashMap<SessionName, LocalSlot>,
    completions: VecDeque<BackendCompletion>,
    refuse_next: HashSet<OperationKind>,
    fail_next: HashSet<OperationKind>,
    scripted_join: Option<JoinSessionResult>,
    scripted_search: Option<Vec<SearchResult>>,
}

impl LoopbackMatchmaking {
    fn new(service: LoopbackService, display_name: String) -> Self {
        Self {
            service,
            display_name,
            available: true,
            ping_ms: LOOPBACK_PING_MS,
            next_token: 0,
            delegates: HashMap::new(),
            registrations_added: 0,
            registrations_cleared: 0,
            calls: BTreeMap::new(),
            slots: HashMap::new(),
            completions: VecDeque::new(),
            refuse_next: HashSet::new(),
            fail_next: HashSet::new(),
            scripted_join: None,
            scripted_search: None,
        }
    }

    /// Standalone endpoint on a private service.
    pub fn standalone(display_name: impl Into<String>) -> Self {
        LoopbackService::new().endpoint(display_name)
    }

    pub fn service(&self) -> &LoopbackService {
        &self.service
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Simulates the online subsystem disappearing (or coming back).
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn with_ping(mut self, ping_ms: u32) -> Self {
        self.ping_ms = ping_ms;
        self
    }

    /// The next request of `kind` is refused synchronously.
    pub fn refuse_next(&mut self, kind: OperationKind) {
        self.refuse_next.insert(kind);
    }

    /// The next request of `kind` is accepted but completes with failure.
    pub fn fail_next(&mut self, kind: OperationKind) {
        self.fail_next.insert(kind);
    }

    /// The next join completes with `result` regardless of session state.
    pub fn script_join_result(&mut self, result: JoinSessionResult) {
        self.scripted_join = Some(result);
    }

    /// The next successful find returns exactly `results`, unfiltered and
    /// uncapped.
    pub fn script_search_results(&mut self, results: Vec<SearchResult>) {
        self.scripted_search = Some(results);
    }

    /// Queues an invite acceptance as the platform overlay would.
    pub fn queue_invite_accepted(&mut self, success: bool, user: UserId, result: SearchResult) {
        self.completions.push_back(BackendCompletion::InviteAccepted {
            success,
            user,
            result,
        });
    }

    pub fn registrations_added(&self) -> usize {
        self.registrations_added
    }

    pub fn registrations_cleared(&self) -> usize {
        self.registrations_cleared
    }

    pub fn active_registrations(&self) -> usize {
        self.delegates.len()
    }

    /// Number of backend calls of `kind` issued so far.
    pub fn calls(&self, kind: OperationKind) -> usize {
        self.calls.get(&kind).copied().unwrap_or(0)
    }

    pub fn queued_completions(&self) -> usize {
        self.completions.len()
    }

    /// Whether this endpoint tracks a local session under `name`.
    pub fn has_session(&self, name: &SessionName) -> bool {
        self.slots.contains_key(name)
    }

    fn record_call(&mut self, kind: OperationKind) -> bool {
        *self.calls.entry(kind).or_insert(0) += 1;
        if self.refuse_next.remove(&kind) {
            debug!(target: "matchmaking::loopback", "{}: refusing {kind}", self.display_name);
            return false;
        }
        self.available
    }

    fn take_failure(&mut self, kind: OperationKind) -> bool {
        self.fail_next.remove(&kind)
    }

    fn push(&mut self, completion: BackendCompletion) {
        self.completions.push_back(completion);
    }

    fn mark_started(&self, name: &SessionName) -> bool {
        let Some(LocalSlot::Hosted(id)) = self.slots.get(name).copied() else {
            return false;
        };
        self.service
            .with_state(|state| {
                state
                    .sessions
                    .iter_mut()
                    .find(|session| session.id == id)
                    .map(|session| session.started = true)
                    .is_some()
            })
            .unwrap_or(false)
    }

    /// A hosted session that never started is taken off the listing and its
    /// slot freed.
    fn withdraw(&mut self, name: &SessionName) {
        let Some(LocalSlot::Hosted(id)) = self.slots.get(name).copied() else {
            return;
        };
        self.slots.remove(name);
        self.service
            .with_state(|state| state.sessions.retain(|session| session.id != id));
        debug!(
            target: "matchmaking::loopback",
            "{}: withdrew {name} ({id}) after failed start",
            self.display_name
        );
    }

    fn join_outcome(&mut self, user: UserId, result: &SearchResult) -> JoinSessionResult {
        self.service
            .with_state(|state| {
                let Some(session) = state
                    .sessions
                    .iter_mut()
                    .find(|session| session.id == result.session_id)
                else {
                    return JoinSessionResult::SessionDoesNotExist;
                };
                if session.players.contains(&user) {
                    return JoinSessionResult::AlreadyInSession;
                }
                if session.started && !session.settings.allow_join_in_progress {
                    return JoinSessionResult::UnknownError;
                }
                if session.open_connections() == 0 {
                    return JoinSessionResult::SessionIsFull;
                }
                session.players.push(user);
                JoinSessionResult::Success
            })
            .unwrap_or(JoinSessionResult::CouldNotRetrieveAddress)
    }
}

impl MatchmakingBackend for LoopbackMatchmaking {
    fn is_available(&self) -> bool {
        self.available
    }

    fn add_completion_delegate(&mut self, kind: OperationKind) -> RegistrationToken {
        self.next_token += 1;
        self.delegates.insert(self.next_token, kind);
        self.registrations_added += 1;
        RegistrationToken::new(kind, self.next_token)
    }

    fn clear_completion_delegate(&mut self, token: RegistrationToken) {
        match self.delegates.remove(&token.id()) {
            Some(kind) if kind == token.kind() => self.registrations_cleared += 1,
            Some(kind) => {
                warn!(
                    target: "matchmaking::loopback",
                    "token {} registered for {kind} cleared as {}",
                    token.id(),
                    token.kind()
                );
                self.registrations_cleared += 1;
            }
            None => warn!(
                target: "matchmaking::loopback",
                "clearing unknown delegate token {}",
                token.id()
            ),
        }
    }

    fn create_session(
        &mut self,
        user: UserId,
        name: &SessionName,
        settings: &SessionSettings,
    ) -> bool {
        if !self.record_call(OperationKind::CreateSession) || self.slots.contains_key(name) {
            return false;
        }
        if self.take_failure(OperationKind::CreateSession) {
            self.push(BackendCompletion::CreateSession {
                name: name.clone(),
                success: false,
            });
            return true;
        }

        let id = SessionId::new();
        let session = AdvertisedSession {
            id,
            owner: user,
            owner_name: self.display_name.clone(),
            settings: settings.clone(),
            started: false,
            players: vec![user],
            ping_ms: self.ping_ms,
        };
        let success = self
            .service
            .with_state(|state| state.sessions.push(session))
            .is_some();
        if success {
            self.slots.insert(name.clone(), LocalSlot::Hosted(id));
        }
        debug!(target: "matchmaking::loopback", "{}: created {name} ({id})", self.display_name);
        self.push(BackendCompletion::CreateSession {
            name: name.clone(),
            success,
        });
        true
    }

    fn start_session(&mut self, name: &SessionName) -> bool {
        if !self.record_call(OperationKind::StartSession) {
            self.withdraw(name);
            return false;
        }
        let success =
            !self.take_failure(OperationKind::StartSession) && self.mark_started(name);
        if !success {
            self.withdraw(name);
        }
        self.push(BackendCompletion::StartSession {
            name: name.clone(),
            success,
        });
        true
    }

    fn find_sessions(&mut self, user: UserId, query: &SearchQuery) {
        if !self.record_call(OperationKind::FindSessions)
            || self.take_failure(OperationKind::FindSessions)
        {
            self.push(BackendCompletion::FindSessions {
                success: false,
                results: Vec::new(),
            });
            return;
        }

        let results = match self.scripted_search.take() {
            Some(results) => results,
            None => self
                .service
                .with_state(|state| {
                    state
                        .sessions
                        .iter()
                        .filter(|session| session.matches(user, query))
                        .take(query.max_search_results)
                        .map(AdvertisedSession::to_search_result)
                        .collect()
                })
                .unwrap_or_default(),
        };
        debug!(
            target: "matchmaking::loopback",
            "{}: find returned {} sessions",
            self.display_name,
            results.len()
        );
        self.push(BackendCompletion::FindSessions {
            success: true,
            results,
        });
    }

    fn join_session(&mut self, user: UserId, name: &SessionName, result: &SearchResult) -> bool {
        if !self.record_call(OperationKind::JoinSession) {
            return false;
        }

        let outcome = if let Some(scripted) = self.scripted_join.take() {
            scripted
        } else if self.take_failure(OperationKind::JoinSession) {
            JoinSessionResult::UnknownError
        } else if self.slots.contains_key(name) {
            JoinSessionResult::AlreadyInSession
        } else {
            self.join_outcome(user, result)
        };

        if outcome.is_success() {
            self.slots.insert(
                name.clone(),
                LocalSlot::Joined {
                    id: result.session_id,
                    user,
                },
            );
        }
        self.push(BackendCompletion::JoinSession {
            name: name.clone(),
            result: outcome,
        });
        true
    }

    fn destroy_session(&mut self, name: &SessionName) -> bool {
        if !self.record_call(OperationKind::DestroySession) {
            return false;
        }
        if self.take_failure(OperationKind::DestroySession) {
            self.push(BackendCompletion::DestroySession {
                name: name.clone(),
                success: false,
            });
            return true;
        }

        let success = match self.slots.remove(name) {
            Some(LocalSlot::Hosted(id)) => self
                .service
                .with_state(|state| state.sessions.retain(|session| session.id != id))
                .is_some(),
            Some(LocalSlot::Joined { id, user }) => {
                debug!(
                    target: "matchmaking::loopback",
                    "{}: leaving session {id}",
                    self.display_name
                );
                self.service
                    .with_state(|state| {
                        if let Some(session) =
                            state.sessions.iter_mut().find(|session| session.id == id)
                        {
                            session.players.retain(|player| *player != user);
                        }
                    })
                    .is_some()
            }
            None => false,
        };
        self.push(BackendCompletion::DestroySession {
            name: name.clone(),
            success,
        });
        true
    }

    fn poll_completions(&mut self, output: &mut Vec<BackendCompletion>) {
        output.extend(self.completions.drain(..));
    }
}

/// In-memory friends service.
#[derive(Debug)]
pub struct LoopbackFriends {
    available: bool,
    lists: HashMap<(u32, String), Vec<Friend>>,
    read: HashSet<(u32, String)>,
    next_token: u64,
    delegates: HashSet<u64>,
    registrations_added: usize,
    registrations_cleared: usize,
    completions: VecDeque<FriendsCompletion>,
}

impl Default for LoopbackFriends {
    fn default() -> Self {
        Self {
            available: true,
            lists: HashMap::new(),
            read: HashSet::new(),
            next_token: 0,
            delegates: HashSet::new(),
            registrations_added: 0,
            registrations_cleared: 0,
            completions: VecDeque::new(),
        }
    }
}

impl LoopbackFriends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(
        mut self,
        local_user: u32,
        list_name: impl Into<String>,
        friends: Vec<Friend>,
    ) -> Self {
        self.lists.insert((local_user, list_name.into()), friends);
        self
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Queues a read notification nobody asked for, as a platform overlay
    /// refreshing the list would.
    pub fn queue_read_complete(&mut self, local_user: u32, list_name: &str) {
        self.complete_read(local_user, list_name);
    }

    pub fn registrations_added(&self) -> usize {
        self.registrations_added
    }

    pub fn registrations_cleared(&self) -> usize {
        self.registrations_cleared
    }

    pub fn active_registrations(&self) -> usize {
        self.delegates.len()
    }

    fn complete_read(&mut self, local_user: u32, list_name: &str) {
        let key = (local_user, list_name.to_owned());
        let completion = if self.lists.contains_key(&key) {
            self.read.insert(key);
            FriendsCompletion::ReadFriendsList {
                local_user,
                success: true,
                list_name: list_name.to_owned(),
                error: String::new(),
            }
        } else {
            FriendsCompletion::ReadFriendsList {
                local_user,
                success: false,
                list_name: list_name.to_owned(),
                error: format!("no friends list {list_name:?} for user {local_user}"),
            }
        };
        self.completions.push_back(completion);
    }
}

impl FriendsBackend for LoopbackFriends {
    fn is_available(&self) -> bool {
        self.available
    }

    fn add_read_delegate(&mut self) -> RegistrationToken {
        self.next_token += 1;
        self.delegates.insert(self.next_token);
        self.registrations_added += 1;
        RegistrationToken::new(OperationKind::ReadFriendsList, self.next_token)
    }

    fn clear_read_delegate(&mut self, token: RegistrationToken) {
        if self.delegates.remove(&token.id()) {
            self.registrations_cleared += 1;
        } else {
            warn!(
                target: "matchmaking::loopback",
                "clearing unknown friends delegate token {}",
                token.id()
            );
        }
    }

    fn read_friends_list(&mut self, local_user: u32, list_name: &str) -> bool {
        if !self.available {
            return false;
        }
        self.complete_read(local_user, list_name);
        true
    }

    fn get_friends_list(
        &self,
        local_user: u32,
        list_name: &str,
    ) -> Result<Vec<Friend>, FriendsError> {
        if !self.available {
            return Err(FriendsError::Unavailable);
        }
        let key = (local_user, list_name.to_owned());
        if !self.read.contains(&key) {
            return Err(FriendsError::ListNotRead {
                local_user,
                list: list_name.to_owned(),
            });
        }
        Ok(self.lists.get(&key).cloned().unwrap_or_default())
    }

    fn poll_completions(&mut self, output: &mut Vec<FriendsCompletion>) {
        output.extend(self.completions.drain(..));
    }
}
