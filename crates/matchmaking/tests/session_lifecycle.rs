use matchmaking::{
    BackendCompletion, Friend, FriendsBackend, JoinSessionResult, LoopbackFriends,
    LoopbackMatchmaking, LoopbackService, MatchmakingBackend, MatchmakingConfig, MatchmakingError,
    MatchmakingEvent, NoopFriends, OperationKind, PendingOperation, RecordingObserver,
    SearchResult, SessionCoordinator, SessionId, SessionName, SessionSettings, UserId,
};
use test_log::test;

#[test]
fn second_create_rejected_while_pending() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));
    let user = UserId::new();

    host.create_session(user, "Game", "Highlands", false, false, 4)
        .unwrap();
    let in_flight = host.session_in_flight().unwrap();
    assert_eq!(in_flight.owner, user);
    assert_eq!(in_flight.map_name(), Some("Highlands"));
    assert!(host.pending(OperationKind::CreateSession));
    assert_eq!(
        host.create_session(user, "Game", "Highlands", false, false, 4),
        Err(MatchmakingError::OperationPending(OperationKind::CreateSession))
    );
    assert_eq!(host.backend().calls(OperationKind::CreateSession), 1);
    assert_eq!(host.backend().registrations_added(), 1);

    // Still rejected while the chained start is in flight.
    host.pump();
    assert_eq!(host.create_phase(), PendingOperation::Starting);
    assert_eq!(
        host.create_session(user, "Other", "", false, false, 4),
        Err(MatchmakingError::OperationPending(OperationKind::StartSession))
    );
    assert_eq!(host.backend().calls(OperationKind::CreateSession), 1);
}

#[test]
fn create_success_chains_exactly_one_start() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));
    host.create_session(UserId::new(), "Game", "Highlands", true, false, 4)
        .unwrap();
    assert_eq!(host.create_phase(), PendingOperation::Creating);
    assert_eq!(host.backend().calls(OperationKind::StartSession), 0);

    assert_eq!(host.pump(), 1);
    assert_eq!(host.backend().calls(OperationKind::StartSession), 1);
    assert!(host.observer().events().is_empty());

    settle(&mut host);
    assert_eq!(host.backend().calls(OperationKind::StartSession), 1);
    assert_eq!(
        host.observer().events(),
        [MatchmakingEvent::SessionReady {
            name: SessionName::game(),
            ok: true
        }]
    );
    let info = host.session_info();
    assert!(info.is_hosting(&SessionName::game()));
    assert_eq!(info.game_map_name, "Highlands");
    assert_balanced(host.backend());
}

#[test]
fn create_failure_chains_no_start() {
    let mut backend = LoopbackMatchmaking::standalone("host");
    backend.fail_next(OperationKind::CreateSession);
    let mut host = coordinator(backend);

    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);

    assert_eq!(host.backend().calls(OperationKind::StartSession), 0);
    assert_eq!(
        host.observer().events(),
        [MatchmakingEvent::SessionReady {
            name: SessionName::game(),
            ok: false
        }]
    );
    assert_eq!(host.session_info().session_name, None);
    assert_eq!(host.backend().registrations_added(), 1);
    assert_balanced(host.backend());
}

#[test]
fn start_failure_reports_session_not_ready() {
    let mut backend = LoopbackMatchmaking::standalone("host");
    backend.fail_next(OperationKind::StartSession);
    let mut host = coordinator(backend);

    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);

    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::SessionReady {
            name: SessionName::game(),
            ok: false
        })
    );
    assert_eq!(host.observer().events().len(), 1);
    assert!(!host.session_info().is_hosting(&SessionName::game()));
    assert_balanced(host.backend());

    // The failed session is no longer listed and its slot can be reused.
    assert_eq!(host.backend().service().session_count(), 0);
    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);
    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::SessionReady {
            name: SessionName::game(),
            ok: true
        })
    );
    assert_eq!(host.backend().service().session_count(), 1);
}

#[test]
fn start_refusal_reports_session_not_ready() {
    let mut backend = LoopbackMatchmaking::standalone("host");
    backend.refuse_next(OperationKind::StartSession);
    let mut host = coordinator(backend);

    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);

    assert_eq!(
        host.observer().events(),
        [MatchmakingEvent::SessionReady {
            name: SessionName::game(),
            ok: false
        }]
    );
    assert_eq!(host.backend().calls(OperationKind::StartSession), 1);
    assert_eq!(host.backend().registrations_added(), 2);
    assert!(host.is_idle());
    assert!(host.session_in_flight().is_none());
    assert_eq!(host.backend().service().session_count(), 0);
    assert_balanced(host.backend());
}

#[test]
fn join_refusal_releases_registration() {
    let mut backend = LoopbackMatchmaking::standalone("client");
    backend.refuse_next(OperationKind::JoinSession);
    let mut client = coordinator(backend);
    let user = UserId::new();

    assert_eq!(
        client.join_session(user, "Game", &search_result(0, 10)),
        Err(MatchmakingError::BackendRejected(OperationKind::JoinSession))
    );
    assert!(!client.pending(OperationKind::JoinSession));
    assert!(client.observer().events().is_empty());
    assert_eq!(client.backend().queued_completions(), 0);
    assert_balanced(client.backend());

    // An accepted invite is refused the same way.
    client.backend_mut().refuse_next(OperationKind::JoinSession);
    assert_eq!(
        client.on_session_user_invite_accepted(true, user, &search_result(1, 10)),
        Err(MatchmakingError::BackendRejected(OperationKind::JoinSession))
    );
    assert!(client.is_idle());
    assert_balanced(client.backend());
}

#[test]
fn destroy_refusal_releases_registration() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));
    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);

    host.backend_mut().refuse_next(OperationKind::DestroySession);
    assert_eq!(
        host.destroy_session("Game"),
        Err(MatchmakingError::BackendRejected(OperationKind::DestroySession))
    );
    assert!(!host.pending(OperationKind::DestroySession));
    assert_eq!(host.observer().events().len(), 1);
    assert!(host.session_info().is_hosting(&SessionName::game()));
    assert_balanced(host.backend());

    host.destroy_session("Game").unwrap();
    settle(&mut host);
    assert_eq!(host.session_info().session_name, None);
    assert_balanced(host.backend());
}

#[test]
fn refused_request_releases_its_registration() {
    let mut backend = LoopbackMatchmaking::standalone("host");
    backend.refuse_next(OperationKind::CreateSession);
    let mut host = coordinator(backend);
    let user = UserId::new();

    assert_eq!(
        host.create_session(user, "Game", "", false, false, 4),
        Err(MatchmakingError::BackendRejected(OperationKind::CreateSession))
    );
    assert!(host.is_idle());
    assert_eq!(host.backend().active_registrations(), 0);
    assert!(host.observer().events().is_empty());

    // The refusal left nothing behind; the next create goes through.
    host.create_session(user, "Game", "", false, false, 4)
        .unwrap();
    settle(&mut host);
    assert_eq!(host.observer().events().len(), 1);
    assert_balanced(host.backend());
}

#[test]
fn invalid_requests_never_reach_the_backend() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));

    assert_eq!(
        host.create_session(UserId::nil(), "Game", "", false, false, 4),
        Err(MatchmakingError::InvalidIdentity)
    );
    assert_eq!(
        host.create_session(UserId::new(), "  ", "", false, false, 4),
        Err(MatchmakingError::InvalidSessionName("  ".into()))
    );
    assert_eq!(
        host.join_session(UserId::new(), "Game", &search_result(0, 10)),
        Ok(())
    );
    settle(&mut host);
    let mut invalid = search_result(1, 10);
    invalid.session_id = SessionId::default();
    assert_eq!(
        host.join_session(UserId::new(), "Game", &invalid),
        Err(MatchmakingError::SearchInvalid)
    );

    assert_eq!(host.backend().calls(OperationKind::CreateSession), 0);
    assert_eq!(host.backend().calls(OperationKind::JoinSession), 1);
    assert_balanced(host.backend());
}

#[test]
fn unavailable_find_notifies_observer_once_synchronously() {
    let mut backend = LoopbackMatchmaking::standalone("client");
    backend.set_available(false);
    let mut client = coordinator(backend);

    assert_eq!(
        client.find_sessions(UserId::new(), false, false),
        Err(MatchmakingError::BackendUnavailable)
    );
    assert_eq!(
        client.observer().events(),
        [MatchmakingEvent::SearchComplete {
            results: Vec::new(),
            ok: false
        }]
    );

    assert_eq!(client.pump(), 0);
    assert_eq!(client.observer().search_completions(), 1);
    assert_eq!(client.backend().calls(OperationKind::FindSessions), 0);
    assert_eq!(client.backend().registrations_added(), 0);
}

#[test]
fn find_with_invalid_identity_notifies_observer() {
    let mut client = coordinator(LoopbackMatchmaking::standalone("client"));

    assert_eq!(
        client.find_sessions(UserId::nil(), false, false),
        Err(MatchmakingError::InvalidIdentity)
    );
    assert_eq!(client.observer().search_completions(), 1);
    assert!(client.is_idle());
}

#[test]
fn search_results_keep_backend_order_and_cap() {
    let mut backend = LoopbackMatchmaking::standalone("client");
    let offered: Vec<_> = (0..25).map(|index| search_result(index, 200 - index)).collect();
    backend.script_search_results(offered.clone());
    let mut client = coordinator(backend);

    client.find_sessions(UserId::new(), true, true).unwrap();
    let query = client.current_query().unwrap();
    assert_eq!(query.max_search_results, 20);
    assert_eq!(query.ping_bucket_size, 50);
    assert!(query.is_lan_query);
    assert!(query.is_presence_query());

    assert_eq!(
        client.find_sessions(UserId::new(), true, true),
        Err(MatchmakingError::OperationPending(OperationKind::FindSessions))
    );
    assert!(client.observer().events().is_empty());

    settle(&mut client);
    assert_eq!(client.search_results(), &offered[..20]);
    assert_eq!(
        client.observer().events(),
        [MatchmakingEvent::SearchComplete {
            results: offered[..20].to_vec(),
            ok: true
        }]
    );
    assert_balanced(client.backend());
}

#[test]
fn search_cap_follows_config() {
    let mut backend = LoopbackMatchmaking::standalone("client");
    backend.script_search_results((0..8).map(|index| search_result(index, 30)).collect());
    let config = MatchmakingConfig::from_toml_str("[search]\nmax_results = 3\n").unwrap();
    let mut client = coordinator(backend).with_config(config);

    client.find_sessions(UserId::new(), false, false).unwrap();
    settle(&mut client);
    assert_eq!(client.search_results().len(), 3);
}

#[test]
fn failed_find_clears_previous_results() {
    let mut backend = LoopbackMatchmaking::standalone("client");
    backend.script_search_results(vec![search_result(0, 20)]);
    let mut client = coordinator(backend);
    let user = UserId::new();

    client.find_sessions(user, false, false).unwrap();
    settle(&mut client);
    assert_eq!(client.search_results().len(), 1);

    client.backend_mut().fail_next(OperationKind::FindSessions);
    client.find_sessions(user, false, false).unwrap();
    settle(&mut client);
    assert!(client.search_results().is_empty());
    assert_eq!(
        client.observer().last(),
        Some(&MatchmakingEvent::SearchComplete {
            results: Vec::new(),
            ok: false
        })
    );
    assert_balanced(client.backend());
}

#[test]
fn full_session_join_passes_code_through() {
    let service = LoopbackService::new();
    let mut host = coordinator(service.endpoint("host"));
    host.create_session(UserId::new(), "Game", "", false, false, 1)
        .unwrap();
    settle(&mut host);

    let mut client = coordinator(service.endpoint("client"));
    let user = UserId::new();
    let target = discover(&mut client, user);
    assert!(target.is_full());

    client.join_session(user, "Game", &target).unwrap();
    settle(&mut client);

    assert_eq!(
        client.observer().last(),
        Some(&MatchmakingEvent::JoinResult {
            name: SessionName::game(),
            result: JoinSessionResult::SessionIsFull
        })
    );
    assert_eq!(client.backend().calls(OperationKind::JoinSession), 1);
    assert_eq!(client.backend().calls(OperationKind::DestroySession), 0);
    assert_eq!(client.backend().calls(OperationKind::CreateSession), 0);
    assert!(client.is_idle());
    assert_balanced(client.backend());
}

#[test]
fn join_into_hosted_session() {
    let service = LoopbackService::new();
    let mut host = coordinator(service.endpoint("host"));
    host.create_session(UserId::new(), "Game", "Highlands", false, false, 4)
        .unwrap();
    settle(&mut host);

    let mut client = coordinator(service.endpoint("client"));
    let user = UserId::new();
    let target = discover(&mut client, user);
    assert_eq!(target.owning_user_name, "host");
    assert_eq!(target.map_name(), Some("Highlands"));

    client.join_session(user, "Game", &target).unwrap();
    assert_eq!(
        client.join_session(user, "Game", &target),
        Err(MatchmakingError::OperationPending(OperationKind::JoinSession))
    );
    settle(&mut client);

    assert_eq!(
        client.observer().last(),
        Some(&MatchmakingEvent::JoinResult {
            name: SessionName::game(),
            result: JoinSessionResult::Success
        })
    );
    assert_eq!(service.player_count(target.session_id), Some(2));
    assert!(client.backend().has_session(&SessionName::game()));
}

#[test]
fn accepted_invite_joins_game_slot_once() {
    let service = LoopbackService::new();
    let mut host = coordinator(service.endpoint("host"));
    host.create_session(UserId::new(), "Game", "", false, true, 4)
        .unwrap();
    settle(&mut host);

    let mut client = coordinator(service.endpoint("client"));
    let user = UserId::new();
    let target = discover(&mut client, user);

    client
        .backend_mut()
        .queue_invite_accepted(true, user, target.clone());
    settle(&mut client);

    assert_eq!(client.backend().calls(OperationKind::JoinSession), 1);
    let joins: Vec<_> = client
        .observer()
        .events()
        .iter()
        .filter_map(|event| match event {
            MatchmakingEvent::JoinResult { name, result } => Some((name.clone(), *result)),
            _ => None,
        })
        .collect();
    assert_eq!(joins, vec![(SessionName::game(), JoinSessionResult::Success)]);
    assert_balanced(client.backend());
}

#[test]
fn rejected_or_invalid_invite_joins_nothing() {
    let mut client = coordinator(LoopbackMatchmaking::standalone("client"));
    let user = UserId::new();

    client
        .backend_mut()
        .queue_invite_accepted(false, user, search_result(0, 10));
    settle(&mut client);

    let mut invalid = search_result(1, 10);
    invalid.owning_user = UserId::nil();
    assert_eq!(
        client.on_session_user_invite_accepted(true, user, &invalid),
        Err(MatchmakingError::SearchInvalid)
    );
    assert_eq!(
        client.on_session_user_invite_accepted(false, user, &invalid),
        Ok(())
    );

    assert_eq!(client.backend().calls(OperationKind::JoinSession), 0);
    assert!(client.observer().events().is_empty());
    assert_eq!(client.backend().registrations_added(), 0);
}

#[test]
fn invite_shares_the_join_guard() {
    let mut client = coordinator(LoopbackMatchmaking::standalone("client"));
    let user = UserId::new();

    client
        .join_session(user, "Game", &search_result(0, 10))
        .unwrap();
    assert_eq!(
        client.on_session_user_invite_accepted(true, user, &search_result(1, 10)),
        Err(MatchmakingError::OperationPending(OperationKind::JoinSession))
    );
    assert_eq!(client.backend().calls(OperationKind::JoinSession), 1);

    settle(&mut client);
    assert_balanced(client.backend());
}

#[test]
fn destroy_clears_hosted_session_info() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));
    host.create_session(UserId::new(), "Game", "Highlands", false, false, 4)
        .unwrap();
    settle(&mut host);
    assert_eq!(host.backend().service().session_count(), 1);

    host.destroy_session("Game").unwrap();
    assert_eq!(
        host.destroy_session("Game"),
        Err(MatchmakingError::OperationPending(OperationKind::DestroySession))
    );
    settle(&mut host);

    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::SessionDestroyed {
            name: SessionName::game(),
            ok: true
        })
    );
    assert_eq!(host.session_info().session_name, None);
    assert_eq!(host.backend().service().session_count(), 0);

    // Nothing left to tear down.
    host.destroy_session("Game").unwrap();
    settle(&mut host);
    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::SessionDestroyed {
            name: SessionName::game(),
            ok: false
        })
    );
    assert_balanced(host.backend());
}

#[test]
fn registrations_balance_over_full_cycles() {
    let service = LoopbackService::new();
    let host_user = UserId::new();
    let client_user = UserId::new();
    let mut host = coordinator(service.endpoint("host"));
    let mut client = coordinator(service.endpoint("client"));

    for round in 0..3 {
        host.create_session(host_user, "Game", "", false, false, 4)
            .unwrap();
        settle(&mut host);

        if round == 1 {
            client.backend_mut().fail_next(OperationKind::FindSessions);
            client.find_sessions(client_user, false, false).unwrap();
            settle(&mut client);
            assert!(client.search_results().is_empty());
        } else {
            let target = discover(&mut client, client_user);
            client.join_session(client_user, "Game", &target).unwrap();
            settle(&mut client);
            client.destroy_session("Game").unwrap();
            settle(&mut client);
        }

        if round == 2 {
            host.backend_mut().fail_next(OperationKind::DestroySession);
            host.destroy_session("Game").unwrap();
            settle(&mut host);
            host.destroy_session("Game").unwrap();
            settle(&mut host);
        } else {
            host.destroy_session("Game").unwrap();
            settle(&mut host);
        }

        assert_balanced(host.backend());
        assert_balanced(client.backend());
    }
    assert_eq!(service.session_count(), 0);
}

#[test]
fn stale_completions_are_ignored() {
    let mut client = coordinator(LoopbackMatchmaking::standalone("client"));

    client.dispatch(BackendCompletion::JoinSession {
        name: SessionName::game(),
        result: JoinSessionResult::Success,
    });
    client.dispatch(BackendCompletion::FindSessions {
        success: true,
        results: vec![search_result(0, 10)],
    });
    client.on_start_session_complete(&SessionName::game(), true);
    client.on_destroy_session_complete(&SessionName::game(), true);

    assert!(client.observer().events().is_empty());
    assert!(client.search_results().is_empty());
    assert!(client.is_idle());
}

#[test]
fn completion_for_another_session_keeps_flight() {
    let mut host = coordinator(LoopbackMatchmaking::standalone("host"));
    host.create_session(UserId::new(), "Game", "", false, false, 4)
        .unwrap();

    host.on_create_session_complete(&SessionName::new("Party"), true);
    assert_eq!(host.create_phase(), PendingOperation::Creating);
    assert_eq!(host.backend().calls(OperationKind::StartSession), 0);

    settle(&mut host);
    assert_eq!(host.observer().events().len(), 1);
    assert_balanced(host.backend());
}

#[test]
fn friends_list_read_and_delivered() {
    let alice = Friend::new(UserId::new(), "alice", true);
    let bob = Friend::new(UserId::new(), "bob", false);
    let friends =
        LoopbackFriends::new().with_list(0, "default", vec![alice.clone(), bob.clone()]);
    let mut host = SessionCoordinator::with_backends(
        LoopbackMatchmaking::standalone("host"),
        friends,
        RecordingObserver::new(),
    );

    host.read_default_friends_list(0).unwrap();
    assert_eq!(
        host.read_friends_list(0, "default"),
        Err(MatchmakingError::OperationPending(OperationKind::ReadFriendsList))
    );
    assert_eq!(host.pending_operations(), vec![PendingOperation::ReadingFriends]);
    settle(&mut host);

    assert_eq!(host.friends(), [alice.clone(), bob.clone()]);
    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::FriendsListReady {
            friends: vec![alice, bob],
            ok: true
        })
    );
    assert_eq!(host.friends_backend().active_registrations(), 0);

    host.read_friends_list(0, "missing").unwrap();
    settle(&mut host);
    assert_eq!(
        host.observer().last(),
        Some(&MatchmakingEvent::FriendsListReady {
            friends: Vec::new(),
            ok: false
        })
    );
    assert_eq!(
        host.friends_backend().registrations_added(),
        host.friends_backend().registrations_cleared()
    );
}

#[test]
fn notification_for_another_list_keeps_read_in_flight() {
    let dave = Friend::new(UserId::new(), "dave", true);
    let erin = Friend::new(UserId::new(), "erin", true);
    let friends = LoopbackFriends::new()
        .with_list(0, "a", vec![dave.clone()])
        .with_list(0, "b", vec![erin.clone()]);
    let mut host = SessionCoordinator::with_backends(
        LoopbackMatchmaking::standalone("host"),
        friends,
        RecordingObserver::new(),
    );

    host.read_friends_list(0, "a").unwrap();
    host.on_read_friends_list_complete(0, true, "b", "");
    assert_eq!(host.pending_operations(), vec![PendingOperation::ReadingFriends]);
    assert_eq!(
        host.read_friends_list(0, "c"),
        Err(MatchmakingError::OperationPending(OperationKind::ReadFriendsList))
    );
    assert_eq!(host.friends_backend().active_registrations(), 1);

    settle(&mut host);
    assert!(host.is_idle());
    assert_eq!(host.friends(), [dave.clone()]);
    assert_eq!(
        host.observer().events(),
        [
            MatchmakingEvent::FriendsListReady {
                friends: Vec::new(),
                ok: false
            },
            MatchmakingEvent::FriendsListReady {
                friends: vec![dave],
                ok: true
            }
        ]
    );
    assert_eq!(
        host.friends_backend().registrations_added(),
        host.friends_backend().registrations_cleared()
    );
}

#[test]
fn unsolicited_friends_notification_is_honored() {
    let carol = Friend::new(UserId::new(), "carol", true);
    let friends = LoopbackFriends::new().with_list(0, "default", vec![carol.clone()]);
    let mut host = SessionCoordinator::with_backends(
        LoopbackMatchmaking::standalone("host"),
        friends,
        RecordingObserver::new(),
    );

    host.friends_backend_mut().queue_read_complete(0, "default");
    settle(&mut host);
    assert_eq!(host.friends(), [carol]);
    assert_eq!(host.observer().events().len(), 1);
}

#[test]
fn friends_unavailable_is_reported_synchronously() {
    let mut friends = LoopbackFriends::new();
    friends.set_available(false);
    let mut host = SessionCoordinator::with_backends(
        LoopbackMatchmaking::standalone("host"),
        friends,
        RecordingObserver::new(),
    );
    assert_eq!(
        host.read_default_friends_list(0),
        Err(MatchmakingError::BackendUnavailable)
    );

    let mut plain = coordinator(LoopbackMatchmaking::standalone("plain"));
    assert_eq!(
        plain.read_friends_list(0, "default"),
        Err(MatchmakingError::BackendUnavailable)
    );
    assert!(plain.observer().events().is_empty());
}

type TestCoordinator = SessionCoordinator<LoopbackMatchmaking, RecordingObserver, NoopFriends>;

fn coordinator(backend: LoopbackMatchmaking) -> TestCoordinator {
    SessionCoordinator::new(backend, RecordingObserver::new())
}

fn settle<B, F>(coordinator: &mut SessionCoordinator<B, RecordingObserver, F>)
where
    B: MatchmakingBackend,
    F: FriendsBackend,
{
    for _ in 0..8 {
        if coordinator.pump() == 0 {
            return;
        }
    }
    panic!("coordinator did not settle: {coordinator:?}");
}

/// Runs a find and returns the first session offered.
fn discover(client: &mut TestCoordinator, user: UserId) -> SearchResult {
    client.find_sessions(user, false, false).unwrap();
    settle(client);
    client
        .search_results()
        .first()
        .cloned()
        .expect("no session offered")
}

fn search_result(index: u32, ping_ms: u32) -> SearchResult {
    SearchResult {
        session_id: SessionId::new(),
        owning_user: UserId::new(),
        owning_user_name: format!("host-{index}"),
        ping_ms,
        open_public_connections: 3,
        settings: SessionSettings::hosted(false, false, 4, ""),
    }
}

fn assert_balanced(backend: &LoopbackMatchmaking) {
    assert_eq!(
        backend.registrations_added(),
        backend.registrations_cleared(),
        "registrations leaked"
    );
    assert_eq!(backend.active_registrations(), 0);
}
