//! Session lifecycle state machine.
//!
//! Every operation kind is tracked independently:
//! `Idle -> Pending -> Idle`, where create cascades through
//! `Creating -> Starting` before its outcome is reported. A kind never has two
//! requests in flight; a second request while one is pending is rejected
//! before the backend is contacted.
//!
//! Each accepted request holds exactly one [`RegistrationToken`]. The token is
//! released in the matching completion handler, or immediately when the
//! backend refuses the request synchronously.

use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    backend::{
        BackendCompletion, Friend, FriendsBackend, FriendsCompletion, JoinSessionResult,
        MatchmakingBackend, NoopFriends, OperationKind, RegistrationToken,
    },
    config::MatchmakingConfig,
    error::MatchmakingError,
    observer::SessionObserver,
    search::{SearchQuery, SearchResult},
    session::{SessionHandle, SessionInfo, SessionName, SessionSettings, UserId},
};

/// Observable phase of an operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingOperation {
    None,
    Creating,
    Starting,
    Finding,
    Joining,
    Destroying,
    ReadingFriends,
}

/// Create is a two-step protocol; the phases are kept apart so the start
/// registration can never be confused with the create registration.
#[derive(Debug)]
enum CreateFlight {
    Creating {
        handle: SessionHandle,
        token: RegistrationToken,
    },
    Starting {
        handle: SessionHandle,
        token: RegistrationToken,
    },
}

impl CreateFlight {
    fn handle(&self) -> &SessionHandle {
        match self {
            CreateFlight::Creating { handle, .. } | CreateFlight::Starting { handle, .. } => handle,
        }
    }

    fn phase(&self) -> PendingOperation {
        match self {
            CreateFlight::Creating { .. } => PendingOperation::Creating,
            CreateFlight::Starting { .. } => PendingOperation::Starting,
        }
    }

    fn kind(&self) -> OperationKind {
        match self {
            CreateFlight::Creating { .. } => OperationKind::CreateSession,
            CreateFlight::Starting { .. } => OperationKind::StartSession,
        }
    }
}

#[derive(Debug)]
struct SessionFlight {
    session: SessionName,
    token: RegistrationToken,
}

#[derive(Debug)]
struct FriendsRead {
    local_user: u32,
    list_name: String,
    token: RegistrationToken,
}

/// Drives create/start/find/join/destroy against a [`MatchmakingBackend`]
/// and reports terminal outcomes to a [`SessionObserver`].
///
/// Not thread-safe by itself: entry points and completions are expected on a
/// single callback thread.
pub struct SessionCoordinator<B, O, F = NoopFriends> {
    backend: B,
    friends_backend: F,
    observer: O,
    config: MatchmakingConfig,
    create: Option<CreateFlight>,
    find: Option<RegistrationToken>,
    join: Option<SessionFlight>,
    destroy: Option<SessionFlight>,
    friends_read: Option<FriendsRead>,
    current_query: Option<SearchQuery>,
    search_results: Vec<SearchResult>,
    session_info: SessionInfo,
    friends: Vec<Friend>,
}

impl<B, O> SessionCoordinator<B, O, NoopFriends>
where
    B: MatchmakingBackend,
    O: SessionObserver,
{
    /// Coordinator without a friends service.
    pub fn new(backend: B, observer: O) -> Self {
        Self::with_backends(backend, NoopFriends::default(), observer)
    }
}

impl<B, O, F> SessionCoordinator<B, O, F>
where
    B: MatchmakingBackend,
    O: SessionObserver,
    F: FriendsBackend,
{
    pub fn with_backends(backend: B, friends_backend: F, observer: O) -> Self {
        Self {
            backend,
            friends_backend,
            observer,
            config: MatchmakingConfig::default(),
            create: None,
            find: None,
            join: None,
            destroy: None,
            friends_read: None,
            current_query: None,
            search_results: Vec::new(),
            session_info: SessionInfo::default(),
            friends: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: MatchmakingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn friends_backend(&self) -> &F {
        &self.friends_backend
    }

    pub fn friends_backend_mut(&mut self) -> &mut F {
        &mut self.friends_backend
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Whether a request of `kind` is in flight.
    pub fn pending(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::CreateSession => {
                matches!(self.create, Some(CreateFlight::Creating { .. }))
            }
            OperationKind::StartSession => {
                matches!(self.create, Some(CreateFlight::Starting { .. }))
            }
            OperationKind::FindSessions => self.find.is_some(),
            OperationKind::JoinSession => self.join.is_some(),
            OperationKind::DestroySession => self.destroy.is_some(),
            OperationKind::ReadFriendsList => self.friends_read.is_some(),
        }
    }

    /// Phase of the create/start cascade.
    pub fn create_phase(&self) -> PendingOperation {
        self.create
            .as_ref()
            .map(CreateFlight::phase)
            .unwrap_or(PendingOperation::None)
    }

    /// All phases currently in flight, in lifecycle order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        let mut pending = Vec::new();
        if let Some(flight) = &self.create {
            pending.push(flight.phase());
        }
        if self.find.is_some() {
            pending.push(PendingOperation::Finding);
        }
        if self.join.is_some() {
            pending.push(PendingOperation::Joining);
        }
        if self.destroy.is_some() {
            pending.push(PendingOperation::Destroying);
        }
        if self.friends_read.is_some() {
            pending.push(PendingOperation::ReadingFriends);
        }
        pending
    }

    pub fn is_idle(&self) -> bool {
        self.pending_operations().is_empty()
    }

    /// Session attempt of the create/start cascade, if one is in flight.
    pub fn session_in_flight(&self) -> Option<&SessionHandle> {
        self.create.as_ref().map(CreateFlight::handle)
    }

    /// Query of the most recent find request.
    pub fn current_query(&self) -> Option<&SearchQuery> {
        self.current_query.as_ref()
    }

    /// Results of the most recent completed find, in backend order.
    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    pub fn session_info(&self) -> &SessionInfo {
        &self.session_info
    }

    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Hosts a new session.
    ///
    /// `Ok` only means the backend accepted the request. The outcome of
    /// create and the chained start is reported once via
    /// [`SessionObserver::on_session_ready`]. Errors are synchronous and never
    /// followed by a callback.
    pub fn create_session(
        &mut self,
        user: UserId,
        name: impl Into<SessionName>,
        map_name: &str,
        is_lan: bool,
        is_presence: bool,
        max_players: u32,
    ) -> Result<(), MatchmakingError> {
        let name = name.into();
        self.admit(Some(user))?;
        if !name.is_valid() {
            return Err(MatchmakingError::InvalidSessionName(name.to_string()));
        }
        if let Some(flight) = &self.create {
            debug!(
                target: "matchmaking::session",
                "create {name} rejected: {} still in flight for {}",
                flight.kind(),
                flight.handle().name
            );
            return Err(MatchmakingError::OperationPending(flight.kind()));
        }

        let settings = SessionSettings::hosted(is_lan, is_presence, max_players, map_name);
        let token = self
            .backend
            .add_completion_delegate(OperationKind::CreateSession);
        if !self.backend.create_session(user, &name, &settings) {
            self.backend.clear_completion_delegate(token);
            warn!(target: "matchmaking::session", "backend refused to create {name}");
            return Err(MatchmakingError::BackendRejected(OperationKind::CreateSession));
        }

        info!(
            target: "matchmaking::session",
            session = %name,
            lan = is_lan,
            presence = is_presence,
            max_players,
            "create session requested"
        );
        self.create = Some(CreateFlight::Creating {
            handle: SessionHandle::new(name, user, settings),
            token,
        });
        Ok(())
    }

    /// Searches for joinable sessions.
    ///
    /// Unlike the other requests, a find that cannot be issued still reaches
    /// the observer: `on_search_complete(&[], false)` is called synchronously
    /// before the error is returned. A find rejected because another find is
    /// pending does not notify; the pending one will.
    pub fn find_sessions(
        &mut self,
        user: UserId,
        is_lan: bool,
        is_presence: bool,
    ) -> Result<(), MatchmakingError> {
        if self.find.is_some() {
            return Err(MatchmakingError::OperationPending(OperationKind::FindSessions));
        }
        if let Err(err) = self.admit(Some(user)) {
            warn!(target: "matchmaking::search", "find sessions not issued: {err}");
            self.search_results.clear();
            self.observer.on_search_complete(&[], false);
            return Err(err);
        }

        let query = self.config.search.query(is_lan, is_presence);
        let token = self
            .backend
            .add_completion_delegate(OperationKind::FindSessions);
        self.find = Some(token);
        self.backend.find_sessions(user, &query);
        debug!(
            target: "matchmaking::search",
            lan = query.is_lan_query,
            presence = query.is_presence_query(),
            max_results = query.max_search_results,
            "find sessions requested"
        );
        self.current_query = Some(query);
        Ok(())
    }

    /// Joins the session described by `result` under the local slot `name`.
    ///
    /// Returns the backend's synchronous verdict; the join outcome is reported
    /// through [`SessionObserver::on_join_result`].
    pub fn join_session(
        &mut self,
        user: UserId,
        name: impl Into<SessionName>,
        result: &SearchResult,
    ) -> Result<(), MatchmakingError> {
        let name = name.into();
        self.admit(Some(user))?;
        if !name.is_valid() {
            return Err(MatchmakingError::InvalidSessionName(name.to_string()));
        }
        if !result.is_valid() {
            return Err(MatchmakingError::SearchInvalid);
        }
        self.issue_join(user, name, result)
    }

    /// Tears down the session tracked as `name`.
    pub fn destroy_session(
        &mut self,
        name: impl Into<SessionName>,
    ) -> Result<(), MatchmakingError> {
        let name = name.into();
        self.admit(None)?;
        if !name.is_valid() {
            return Err(MatchmakingError::InvalidSessionName(name.to_string()));
        }
        if let Some(flight) = &self.destroy {
            debug!(
                target: "matchmaking::session",
                "destroy {name} rejected: destroy of {} in flight", flight.session
            );
            return Err(MatchmakingError::OperationPending(OperationKind::DestroySession));
        }

        let token = self
            .backend
            .add_completion_delegate(OperationKind::DestroySession);
        if !self.backend.destroy_session(&name) {
            self.backend.clear_completion_delegate(token);
            warn!(target: "matchmaking::session", "backend refused to destroy {name}");
            return Err(MatchmakingError::BackendRejected(OperationKind::DestroySession));
        }

        info!(target: "matchmaking::session", session = %name, "destroy session requested");
        self.destroy = Some(SessionFlight {
            session: name,
            token,
        });
        Ok(())
    }

    /// Reads `list_name` for `local_user`; the list is delivered through
    /// [`SessionObserver::on_friends_list_ready`].
    pub fn read_friends_list(
        &mut self,
        local_user: u32,
        list_name: &str,
    ) -> Result<(), MatchmakingError> {
        if !self.friends_backend.is_available() {
            return Err(MatchmakingError::BackendUnavailable);
        }
        if self.friends_read.is_some() {
            return Err(MatchmakingError::OperationPending(OperationKind::ReadFriendsList));
        }

        let token = self.friends_backend.add_read_delegate();
        if !self.friends_backend.read_friends_list(local_user, list_name) {
            self.friends_backend.clear_read_delegate(token);
            warn!(
                target: "matchmaking::friends",
                "friends backend refused to read {list_name:?} for user {local_user}"
            );
            return Err(MatchmakingError::BackendRejected(OperationKind::ReadFriendsList));
        }

        self.friends_read = Some(FriendsRead {
            local_user,
            list_name: list_name.to_owned(),
            token,
        });
        Ok(())
    }

    /// [`read_friends_list`](Self::read_friends_list) with the configured default list.
    pub fn read_default_friends_list(&mut self, local_user: u32) -> Result<(), MatchmakingError> {
        let list = self.config.friends.default_list.clone();
        self.read_friends_list(local_user, &list)
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Drains both backends once and dispatches what they produced.
    ///
    /// Returns the number of completions handled. Handling a completion may
    /// queue further ones (create chains into start), so hosts call this once
    /// per frame or until it returns 0.
    pub fn pump(&mut self) -> usize {
        let mut completions = Vec::new();
        self.backend.poll_completions(&mut completions);
        let mut friend_completions = Vec::new();
        self.friends_backend.poll_completions(&mut friend_completions);

        let handled = completions.len() + friend_completions.len();
        for completion in completions {
            self.dispatch(completion);
        }
        for completion in friend_completions {
            self.dispatch_friends(completion);
        }
        handled
    }

    pub fn dispatch(&mut self, completion: BackendCompletion) {
        match completion {
            BackendCompletion::CreateSession { name, success } => {
                self.on_create_session_complete(&name, success)
            }
            BackendCompletion::StartSession { name, success } => {
                self.on_start_session_complete(&name, success)
            }
            BackendCompletion::FindSessions { success, results } => {
                self.on_find_sessions_complete(success, results)
            }
            BackendCompletion::JoinSession { name, result } => {
                self.on_join_session_complete(&name, result)
            }
            BackendCompletion::DestroySession { name, success } => {
                self.on_destroy_session_complete(&name, success)
            }
            BackendCompletion::InviteAccepted {
                success,
                user,
                result,
            } => {
                if let Err(err) = self.on_session_user_invite_accepted(success, user, &result) {
                    warn!(target: "matchmaking::session", "accepted invite not joined: {err}");
                }
            }
        }
    }

    pub fn dispatch_friends(&mut self, completion: FriendsCompletion) {
        match completion {
            FriendsCompletion::ReadFriendsList {
                local_user,
                success,
                list_name,
                error,
            } => self.on_read_friends_list_complete(local_user, success, &list_name, &error),
        }
    }

    /// Create finished. Releases the create registration and, on success,
    /// chains into start.
    pub fn on_create_session_complete(&mut self, name: &SessionName, success: bool) {
        let handle = match self.create.take() {
            Some(CreateFlight::Creating { handle, token }) if handle.name == *name => {
                self.backend.clear_completion_delegate(token);
                handle
            }
            other => {
                warn!(
                    target: "matchmaking::session",
                    "ignoring create completion for {name}: no matching create in flight"
                );
                self.create = other;
                return;
            }
        };

        debug!(target: "matchmaking::session", session = %name, success, "create session complete");
        if !success {
            self.observer.on_session_ready(name, false);
            return;
        }

        let token = self
            .backend
            .add_completion_delegate(OperationKind::StartSession);
        if !self.backend.start_session(name) {
            self.backend.clear_completion_delegate(token);
            warn!(target: "matchmaking::session", "backend refused to start {name}");
            self.observer.on_session_ready(name, false);
            return;
        }
        self.create = Some(CreateFlight::Starting { handle, token });
    }

    /// Start finished. Reports the combined create+start outcome.
    pub fn on_start_session_complete(&mut self, name: &SessionName, success: bool) {
        let handle = match self.create.take() {
            Some(CreateFlight::Starting { handle, token }) if handle.name == *name => {
                self.backend.clear_completion_delegate(token);
                handle
            }
            other => {
                warn!(
                    target: "matchmaking::session",
                    "ignoring start completion for {name}: no matching start in flight"
                );
                self.create = other;
                return;
            }
        };

        debug!(target: "matchmaking::session", session = %name, success, "start session complete");
        if success {
            self.session_info = SessionInfo::hosted(
                handle.name.clone(),
                &self.config.session.entry_map,
                handle.map_name().unwrap_or_default(),
            );
        }
        self.observer.on_session_ready(name, success);
    }

    /// Find finished. Exposes at most `max_search_results` results in the
    /// order the backend returned them.
    pub fn on_find_sessions_complete(&mut self, success: bool, mut results: Vec<SearchResult>) {
        let Some(token) = self.find.take() else {
            warn!(
                target: "matchmaking::search",
                "ignoring find completion: no find in flight"
            );
            return;
        };
        self.backend.clear_completion_delegate(token);

        if success {
            let cap = self
                .current_query
                .as_ref()
                .map(|query| query.max_search_results)
                .unwrap_or(self.config.search.max_results);
            results.truncate(cap);
            self.search_results = results;
        } else {
            self.search_results.clear();
        }

        info!(
            target: "matchmaking::search",
            success,
            results = self.search_results.len(),
            "find sessions complete"
        );
        self.observer
            .on_search_complete(&self.search_results, success);
    }

    /// Join finished. Terminal: the code is reported unchanged, nothing is
    /// chained.
    pub fn on_join_session_complete(&mut self, name: &SessionName, result: JoinSessionResult) {
        match self.join.take() {
            Some(flight) if flight.session == *name => {
                self.backend.clear_completion_delegate(flight.token);
            }
            other => {
                warn!(
                    target: "matchmaking::session",
                    "ignoring join completion for {name}: no matching join in flight"
                );
                self.join = other;
                return;
            }
        }

        info!(target: "matchmaking::session", session = %name, %result, "join session complete");
        self.observer.on_join_result(name, result);
    }

    /// Destroy finished. Terminal.
    pub fn on_destroy_session_complete(&mut self, name: &SessionName, success: bool) {
        match self.destroy.take() {
            Some(flight) if flight.session == *name => {
                self.backend.clear_completion_delegate(flight.token);
            }
            other => {
                warn!(
                    target: "matchmaking::session",
                    "ignoring destroy completion for {name}: no matching destroy in flight"
                );
                self.destroy = other;
                return;
            }
        }

        info!(target: "matchmaking::session", session = %name, success, "destroy session complete");
        if success && self.session_info.is_hosting(name) {
            self.session_info = SessionInfo::default();
        }
        self.observer.on_session_destroyed(name, success);
    }

    /// An invite was accepted outside the game.
    ///
    /// With `success` and a valid result this joins into the game-session
    /// slot through the same single-flight guard as
    /// [`join_session`](Self::join_session). Otherwise nothing is issued.
    pub fn on_session_user_invite_accepted(
        &mut self,
        success: bool,
        user: UserId,
        result: &SearchResult,
    ) -> Result<(), MatchmakingError> {
        info!(target: "matchmaking::session", success, "session user invite accepted");
        if !success {
            return Ok(());
        }
        if !result.is_valid() {
            return Err(MatchmakingError::SearchInvalid);
        }
        self.admit(Some(user))?;
        let slot = self.config.session.game_session_name();
        self.issue_join(user, slot, result)
    }

    /// A friends list read finished, solicited or not.
    pub fn on_read_friends_list_complete(
        &mut self,
        local_user: u32,
        success: bool,
        list_name: &str,
        error: &str,
    ) {
        match self.friends_read.take() {
            Some(read) if read.local_user == local_user && read.list_name == list_name => {
                self.friends_backend.clear_read_delegate(read.token);
            }
            other => {
                if let Some(read) = &other {
                    debug!(
                        target: "matchmaking::friends",
                        "read of {:?} for user {} still in flight",
                        read.list_name,
                        read.local_user
                    );
                }
                debug!(
                    target: "matchmaking::friends",
                    "unsolicited friends list {list_name:?} notification for user {local_user}"
                );
                self.friends_read = other;
            }
        }

        if !success {
            warn!(target: "matchmaking::friends", "failed to read friends: {error}");
            self.observer.on_friends_list_ready(&[], false);
            return;
        }

        match self.friends_backend.get_friends_list(local_user, list_name) {
            Ok(friends) => {
                info!(
                    target: "matchmaking::friends",
                    count = friends.len(),
                    "friends list {list_name:?} ready"
                );
                self.friends = friends;
                self.observer.on_friends_list_ready(&self.friends, true);
            }
            Err(err) => {
                warn!(target: "matchmaking::friends", "failed to get friends list: {err}");
                self.observer.on_friends_list_ready(&[], false);
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn admit(&self, user: Option<UserId>) -> Result<(), MatchmakingError> {
        if !self.backend.is_available() {
            return Err(MatchmakingError::BackendUnavailable);
        }
        if let Some(user) = user {
            if !user.is_valid() {
                return Err(MatchmakingError::InvalidIdentity);
            }
        }
        Ok(())
    }

    fn issue_join(
        &mut self,
        user: UserId,
        name: SessionName,
        result: &SearchResult,
    ) -> Result<(), MatchmakingError> {
        if let Some(flight) = &self.join {
            debug!(
                target: "matchmaking::session",
                "join {name} rejected: join of {} in flight", flight.session
            );
            return Err(MatchmakingError::OperationPending(OperationKind::JoinSession));
        }

        let token = self
            .backend
            .add_completion_delegate(OperationKind::JoinSession);
        if !self.backend.join_session(user, &name, result) {
            self.backend.clear_completion_delegate(token);
            warn!(target: "matchmaking::session", "backend refused to join {name}");
            return Err(MatchmakingError::BackendRejected(OperationKind::JoinSession));
        }

        info!(
            target: "matchmaking::session",
            session = %name,
            host = %result.owning_user_name,
            "join session requested"
        );
        self.join = Some(SessionFlight {
            session: name,
            token,
        });
        Ok(())
    }
}

impl<B, O, F> fmt::Debug for SessionCoordinator<B, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("create", &self.create)
            .field("find", &self.find)
            .field("join", &self.join)
            .field("destroy", &self.destroy)
            .field("friends_read", &self.friends_read)
            .field("search_results", &self.search_results.len())
            .field("session_info", &self.session_info)
            .finish()
    }
}
