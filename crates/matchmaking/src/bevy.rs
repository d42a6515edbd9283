//! Bevy integration: the coordinator as a resource, pumped in `PreUpdate`,
//! with its outcomes re-emitted as ECS events.

use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use bevy::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::{
    backend::{FriendsBackend, MatchmakingBackend, NoopFriends},
    coordinator::SessionCoordinator,
    error::MatchmakingError,
    observer::{ChannelObserver, MatchmakingEvent},
};

/// Upper bound of pump rounds per frame.
pub const MAX_PUMP_ROUNDS: usize = 16;

/// Every observer outcome, re-emitted as a Bevy event.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SessionEvent(pub MatchmakingEvent);

/// Failed outcomes only, for UI code that just shows errors.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SessionErrorEvent(pub MatchmakingError);

/// Channel between a [`ChannelObserver`] and the ECS world.
#[derive(Resource)]
pub struct MatchmakingEventChannel {
    sender: UnboundedSender<MatchmakingEvent>,
    receiver: Arc<Mutex<UnboundedReceiver<MatchmakingEvent>>>,
}

impl Default for MatchmakingEventChannel {
    fn default() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl MatchmakingEventChannel {
    pub fn sender(&self) -> UnboundedSender<MatchmakingEvent> {
        self.sender.clone()
    }

    /// Observer feeding this channel; hand it to a coordinator.
    pub fn observer(&self) -> ChannelObserver {
        ChannelObserver::new(self.sender())
    }
}

/// Coordinator owned by the world.
#[derive(Resource)]
pub struct Matchmaking<B, F = NoopFriends>(pub SessionCoordinator<B, ChannelObserver, F>)
where
    B: MatchmakingBackend + Send + Sync + 'static,
    F: FriendsBackend + Send + Sync + 'static;

/// Pumps the [`Matchmaking`] coordinator once per frame and forwards its
/// outcomes as [`SessionEvent`]s.
pub struct MatchmakingPlugin<B, F = NoopFriends> {
    _backends: PhantomData<fn() -> (B, F)>,
}

impl<B, F> Default for MatchmakingPlugin<B, F> {
    fn default() -> Self {
        Self {
            _backends: PhantomData,
        }
    }
}

impl<B, F> Plugin for MatchmakingPlugin<B, F>
where
    B: MatchmakingBackend + Send + Sync + 'static,
    F: FriendsBackend + Send + Sync + 'static,
{
    fn build(&self, app: &mut App) {
        app.add_event::<SessionEvent>()
            .add_event::<SessionErrorEvent>();

        if !app.world().contains_resource::<MatchmakingEventChannel>() {
            app.insert_resource(MatchmakingEventChannel::default());
        }

        app.add_systems(
            PreUpdate,
            (
                pump_coordinator::<B, F>.run_if(resource_exists::<Matchmaking<B, F>>),
                pump_matchmaking_events.run_if(resource_exists::<MatchmakingEventChannel>),
            )
                .chain(),
        );
    }
}

fn pump_coordinator<B, F>(mut matchmaking: ResMut<Matchmaking<B, F>>)
where
    B: MatchmakingBackend + Send + Sync + 'static,
    F: FriendsBackend + Send + Sync + 'static,
{
    // Create chains into start; drain until the backends go quiet.
    for _ in 0..MAX_PUMP_ROUNDS {
        if matchmaking.0.pump() == 0 {
            return;
        }
    }
    warn!(
        target: "matchmaking::bevy",
        "backends still busy after {MAX_PUMP_ROUNDS} pump rounds, continuing next frame"
    );
}

fn pump_matchmaking_events(
    channel: Res<MatchmakingEventChannel>,
    mut session_writer: EventWriter<SessionEvent>,
    mut error_writer: EventWriter<SessionErrorEvent>,
) {
    let Ok(mut receiver) = channel.receiver.lock() else {
        warn!(target: "matchmaking::bevy", "matchmaking event receiver poisoned");
        return;
    };
    while let Ok(event) = receiver.try_recv() {
        if let Some(error) = event.error() {
            error_writer.write(SessionErrorEvent(error));
        }
        session_writer.write(SessionEvent(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{BackendCompletion, JoinSessionResult, OperationKind, RegistrationToken},
        loopback::LoopbackMatchmaking,
        search::{SearchQuery, SearchResult},
        session::{SessionName, SessionSettings, UserId},
    };

    /// Produces a stray completion on every poll.
    #[derive(Default)]
    struct ChattyBackend {
        polls: usize,
    }

    impl MatchmakingBackend for ChattyBackend {
        fn is_available(&self) -> bool {
            true
        }

        fn add_completion_delegate(&mut self, kind: OperationKind) -> RegistrationToken {
            RegistrationToken::new(kind, 0)
        }

        fn clear_completion_delegate(&mut self, _token: RegistrationToken) {}

        fn create_session(&mut self, _: UserId, _: &SessionName, _: &SessionSettings) -> bool {
            false
        }

        fn start_session(&mut self, _: &SessionName) -> bool {
            false
        }

        fn find_sessions(&mut self, _: UserId, _: &SearchQuery) {}

        fn join_session(&mut self, _: UserId, _: &SessionName, _: &SearchResult) -> bool {
            false
        }

        fn destroy_session(&mut self, _: &SessionName) -> bool {
            false
        }

        fn poll_completions(&mut self, output: &mut Vec<BackendCompletion>) {
            self.polls += 1;
            output.push(BackendCompletion::DestroySession {
                name: SessionName::game(),
                success: true,
            });
        }
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MatchmakingPlugin::<LoopbackMatchmaking>::default());
        app
    }

    #[test]
    fn test_create_reaches_world_as_session_event() {
        let mut app = app();
        let observer = app.world().resource::<MatchmakingEventChannel>().observer();
        let mut coordinator =
            SessionCoordinator::new(LoopbackMatchmaking::standalone("host"), observer);
        coordinator
            .create_session(UserId::new(), SessionName::game(), "", true, false, 4)
            .unwrap();
        app.insert_resource(Matchmaking(coordinator));

        app.update();

        let events = app.world().resource::<Events<SessionEvent>>();
        let received: Vec<_> = events.iter_current_update_events().cloned().collect();
        assert_eq!(
            received,
            vec![SessionEvent(MatchmakingEvent::SessionReady {
                name: SessionName::game(),
                ok: true
            })]
        );
        let matchmaking = app
            .world()
            .resource::<Matchmaking<LoopbackMatchmaking>>();
        assert!(matchmaking.0.is_idle());
        assert_eq!(matchmaking.0.backend().calls(OperationKind::StartSession), 1);
    }

    #[test]
    fn test_pump_is_bounded_per_frame() {
        let mut app = App::new();
        app.add_plugins(MatchmakingPlugin::<ChattyBackend>::default());
        let observer = app.world().resource::<MatchmakingEventChannel>().observer();
        app.insert_resource(Matchmaking(SessionCoordinator::new(
            ChattyBackend::default(),
            observer,
        )));

        app.update();

        let matchmaking = app.world().resource::<Matchmaking<ChattyBackend>>();
        assert_eq!(matchmaking.0.backend().polls, MAX_PUMP_ROUNDS);
        let events = app.world().resource::<Events<SessionEvent>>();
        assert_eq!(events.iter_current_update_events().count(), 0);
    }

    #[test]
    fn test_failures_are_mirrored_as_error_events() {
        let mut app = app();
        let sender = app.world().resource::<MatchmakingEventChannel>().sender();
        sender
            .send(MatchmakingEvent::JoinResult {
                name: SessionName::game(),
                result: JoinSessionResult::SessionIsFull,
            })
            .unwrap();

        app.update();

        let errors = app.world().resource::<Events<SessionErrorEvent>>();
        let received: Vec<_> = errors.iter_current_update_events().cloned().collect();
        assert_eq!(
            received,
            vec![SessionErrorEvent(MatchmakingError::JoinRejected(
                JoinSessionResult::SessionIsFull
            ))]
        );
    }
}
