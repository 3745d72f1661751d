//! Tests for the channel session registry.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tabletop_sessions::{ChannelKey, EndSignal, Phase, SessionError, SessionRegistry, UserId};

/// Game used by these tests: remembers its players and holds its end signal.
struct Table {
    players: Vec<UserId>,
    end: Option<EndSignal>,
}

fn table(setup: tabletop_sessions::GameSetup) -> Result<Table, SessionError> {
    Ok(Table {
        players: setup.players,
        end: Some(setup.end),
    })
}

fn user(id: &str) -> UserId {
    UserId::from(id)
}

async fn wait_until_idle(registry: &SessionRegistry<Table>, channel: &ChannelKey) {
    for _ in 0..200 {
        if registry.phase(channel) == Phase::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("channel {channel} never returned to idle");
}

#[test]
fn test_open_join_cancel_scenario() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("C1");

    assert!(registry.try_open(&channel));
    assert!(registry.is_open(&channel));
    assert!(registry.add_player(&channel, &user("A")));
    assert!(registry.add_player(&channel, &user("B")));
    assert!(!registry.add_player(&channel, &user("A")), "duplicate join");

    let expected: HashSet<UserId> = [user("A"), user("B")].into_iter().collect();
    assert_eq!(registry.current_players(&channel), expected);

    assert!(registry.cancel(&channel));
    assert_eq!(registry.phase(&channel), Phase::Idle);
    assert!(registry.current_players(&channel).is_empty());
    assert!(!registry.add_player(&channel, &user("A")), "channel no longer open");
    assert!(registry.is_empty(), "idle channels are pruned");
}

#[test]
fn test_open_twice_refused() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("C1");

    assert!(registry.try_open(&channel));
    assert!(!registry.try_open(&channel));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_commands_on_unknown_channel_refused() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("nowhere");

    assert!(!registry.add_player(&channel, &user("A")));
    assert!(!registry.remove_player(&channel, &user("A")));
    assert!(!registry.cancel(&channel));
    assert!(!registry.on_game_end(&channel));
    assert_eq!(registry.phase(&channel), Phase::Idle);
    assert!(registry.active_game(&channel).is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_remove_player() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    registry.add_player(&channel, &user("B"));

    assert!(registry.remove_player(&channel, &user("A")));
    assert!(!registry.remove_player(&channel, &user("A")), "already left");
    assert!(!registry.remove_player(&channel, &user("Z")), "never joined");

    let expected: HashSet<UserId> = [user("B")].into_iter().collect();
    assert_eq!(registry.current_players(&channel), expected);
}

#[test]
fn test_concurrent_joins_all_recorded() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("busy");
    registry.try_open(&channel);

    let users: Vec<UserId> = (0..300).map(|i| UserId::from(format!("user-{i}"))).collect();
    let barrier = Barrier::new(users.len());

    std::thread::scope(|scope| {
        for user in &users {
            let registry = &registry;
            let channel = &channel;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                assert!(registry.add_player(channel, user));
            });
        }
    });

    let expected: HashSet<UserId> = users.into_iter().collect();
    assert_eq!(registry.current_players(&channel), expected);
}

#[test]
fn test_concurrent_joins_and_leaves_keep_every_update() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("churn");
    registry.try_open(&channel);

    let leavers: Vec<UserId> = (0..100).map(|i| UserId::from(format!("leaver-{i}"))).collect();
    let joiners: Vec<UserId> = (0..100).map(|i| UserId::from(format!("joiner-{i}"))).collect();
    for user in &leavers {
        assert!(registry.add_player(&channel, user));
    }
    let barrier = Barrier::new(leavers.len() + joiners.len());

    std::thread::scope(|scope| {
        for user in &leavers {
            let (registry, channel, barrier) = (&registry, &channel, &barrier);
            scope.spawn(move || {
                barrier.wait();
                assert!(registry.remove_player(channel, user));
            });
        }
        for user in &joiners {
            let (registry, channel, barrier) = (&registry, &channel, &barrier);
            scope.spawn(move || {
                barrier.wait();
                assert!(registry.add_player(channel, user));
            });
        }
    });

    let expected: HashSet<UserId> = joiners.into_iter().collect();
    assert_eq!(registry.current_players(&channel), expected);
    assert!(registry.is_open(&channel));
}

#[test]
fn test_cancel_racing_joins_and_leaves_is_serializable() {
    let registry = SessionRegistry::<Table>::new();
    let channel = ChannelKey::from("closing");
    registry.try_open(&channel);

    let leavers: Vec<UserId> = (0..50).map(|i| UserId::from(format!("leaver-{i}"))).collect();
    let joiners: Vec<UserId> = (0..150).map(|i| UserId::from(format!("joiner-{i}"))).collect();
    for user in &leavers {
        registry.add_player(&channel, user);
    }
    let cancellers = 2;
    let barrier = Barrier::new(leavers.len() + joiners.len() + cancellers);

    let cancels: Vec<bool> = std::thread::scope(|scope| {
        for user in &leavers {
            let (registry, channel, barrier) = (&registry, &channel, &barrier);
            scope.spawn(move || {
                barrier.wait();
                // A refused leave can only mean the channel was already cancelled.
                if !registry.remove_player(channel, user) {
                    assert_eq!(registry.phase(channel), Phase::Idle);
                }
            });
        }
        for user in &joiners {
            let (registry, channel, barrier) = (&registry, &channel, &barrier);
            scope.spawn(move || {
                barrier.wait();
                // Once a join is refused the cancel has committed, and nothing
                // may be accepted after it.
                if !registry.add_player(channel, user) {
                    assert_eq!(registry.phase(channel), Phase::Idle);
                    assert!(registry.current_players(channel).is_empty());
                }
            });
        }
        let handles: Vec<_> = (0..cancellers)
            .map(|_| {
                let (registry, channel, barrier) = (&registry, &channel, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    registry.cancel(channel)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("cancel thread"))
            .collect()
    });

    assert_eq!(
        cancels.iter().filter(|won| **won).count(),
        1,
        "exactly one cancel commits"
    );
    assert_eq!(registry.phase(&channel), Phase::Idle);
    assert!(registry.current_players(&channel).is_empty());
    assert!(registry.is_empty());

    // No accepted join or leave leaks into the next session.
    assert!(registry.try_open(&channel));
    assert!(registry.current_players(&channel).is_empty());
}

#[test]
fn test_channels_are_independent() {
    let registry = SessionRegistry::<Table>::new();
    let first = ChannelKey::from("first");
    let second = ChannelKey::from("second");

    registry.try_open(&first);
    registry.try_open(&second);
    registry.add_player(&first, &user("A"));
    registry.cancel(&second);

    assert!(registry.is_open(&first));
    assert_eq!(registry.phase(&second), Phase::Idle);
    assert_eq!(registry.current_players(&first).len(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_start_without_runtime_refused() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));

    let result = registry.try_start(&channel, table);
    assert_eq!(result.err(), Some(SessionError::NoRuntime));
    assert!(registry.is_open(&channel), "nothing changed");
}

#[tokio::test]
async fn test_start_hands_sorted_players_to_factory() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    for id in ["carol", "alice", "bob"] {
        registry.add_player(&channel, &user(id));
    }

    let handle = registry.try_start(&channel, table).expect("start");
    assert!(registry.is_active(&channel));
    assert!(!registry.is_open(&channel));
    assert_eq!(handle.channel(), &channel);

    let game = handle.lock().await;
    assert_eq!(game.players, vec![user("alice"), user("bob"), user("carol")]);
}

#[tokio::test]
async fn test_active_channel_refuses_lobby_commands() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    let _handle = registry.try_start(&channel, table).expect("start");

    assert!(!registry.try_open(&channel));
    assert!(!registry.add_player(&channel, &user("B")));
    assert!(!registry.remove_player(&channel, &user("A")));
    assert!(!registry.cancel(&channel));

    let second = registry.try_start(&channel, table);
    assert!(matches!(
        second,
        Err(SessionError::StateConflict {
            actual: Phase::Active,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_exactly_one_wins() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("race");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    registry.add_player(&channel, &user("B"));

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let registry = Arc::clone(&registry);
        let channel = channel.clone();
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            registry.try_start(&channel, table)
        }));
    }

    let mut winners = Vec::new();
    for task in tasks {
        if let Ok(handle) = task.await.expect("task panicked") {
            winners.push(handle);
        }
    }
    assert_eq!(winners.len(), 1);

    let active = registry.active_game(&channel).expect("active game");
    assert_eq!(active.id(), winners[0].id());
    assert!(active.same_game(&winners[0]));
}

#[tokio::test]
async fn test_factory_failure_reopens_channel() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    registry.add_player(&channel, &user("B"));

    let result = registry.try_start(&channel, |_setup| Err::<Table, _>("deck missing"));
    match result {
        Err(SessionError::GameConstruction { reason, .. }) => assert_eq!(reason, "deck missing"),
        other => panic!("expected construction error, got {other:?}"),
    }

    assert!(registry.is_open(&channel));
    assert_eq!(registry.current_players(&channel).len(), 2);
    assert!(registry.try_start(&channel, table).is_ok(), "retry succeeds");
}

#[tokio::test]
async fn test_panicking_factory_reopens_channel() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    registry.add_player(&channel, &user("B"));

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        registry.try_start(&channel, |_setup| -> Result<Table, SessionError> {
            panic!("dealer dropped the deck")
        })
    }));
    assert!(outcome.is_err(), "panic propagates to the caller");

    assert!(registry.is_open(&channel));
    assert_eq!(registry.current_players(&channel).len(), 2);
    assert!(registry.try_start(&channel, table).is_ok(), "retry succeeds");
}

#[tokio::test]
async fn test_game_that_drops_its_signal_while_building_still_ends() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));

    let handle = registry
        .try_start(&channel, |setup| {
            drop(setup.end);
            Ok::<_, SessionError>(Table {
                players: setup.players,
                end: None,
            })
        })
        .expect("start");

    wait_until_idle(&registry, &channel).await;
    assert!(handle.lock().await.end.is_none());
}

#[tokio::test]
async fn test_explicit_end_stops_watching_the_signal() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    let handle = registry.try_start(&channel, table).expect("start");

    let metrics = tokio::runtime::Handle::current().metrics();
    assert_eq!(metrics.num_alive_tasks(), 1, "one watcher per active game");

    assert!(registry.on_game_end(&channel));
    for _ in 0..200 {
        if metrics.num_alive_tasks() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // The game and its signal are still alive, but nothing is listening.
    assert_eq!(metrics.num_alive_tasks(), 0);
    assert!(handle.lock().await.end.is_some());
}

#[tokio::test]
async fn test_end_signal_returns_channel_to_idle() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    let handle = registry.try_start(&channel, table).expect("start");

    let end = handle.lock().await.end.take().expect("end signal");
    end.fire();
    wait_until_idle(&registry, &channel).await;

    assert!(registry.active_game(&channel).is_none());
    assert!(registry.current_players(&channel).is_empty());
    assert!(registry.try_open(&channel), "channel reusable");
}

#[tokio::test]
async fn test_dropped_end_signal_ends_game() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    let handle = registry.try_start(&channel, table).expect("start");

    drop(handle.lock().await.end.take());
    wait_until_idle(&registry, &channel).await;
}

#[tokio::test]
async fn test_explicit_end_then_stale_signal_is_harmless() {
    let registry = Arc::new(SessionRegistry::<Table>::new());
    let channel = ChannelKey::from("C1");
    registry.try_open(&channel);
    registry.add_player(&channel, &user("A"));
    let first = registry.try_start(&channel, table).expect("start");

    assert!(registry.on_game_end(&channel));
    assert!(!registry.on_game_end(&channel), "already ended");
    assert_eq!(registry.phase(&channel), Phase::Idle);

    // A new game in the same channel must survive the old game's signal.
    registry.try_open(&channel);
    registry.add_player(&channel, &user("B"));
    let second = registry.try_start(&channel, table).expect("restart");
    assert_ne!(first.id(), second.id());

    let stale = first.lock().await.end.take().expect("end signal");
    stale.fire();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let active = registry.active_game(&channel).expect("second game still active");
    assert_eq!(active.id(), second.id());
}
