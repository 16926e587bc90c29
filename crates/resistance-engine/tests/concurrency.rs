//! Many callers hitting one session (and one registry) at once, on a
//! multi-threaded runtime with real time.

#[allow(dead_code)]
mod common;

use std::sync::Arc;

use futures::future::join_all;

use resistance_core::error::ErrorKind;
use resistance_core::events::{GameEvent, NullSink};
use resistance_core::state::GameState;

use resistance_engine::{EngineConfig, PacingConfig, SessionRegistry};

use common::{TestGame, team};

fn quick_config() -> EngineConfig {
    EngineConfig {
        init_wait_secs: 30,
        voting_timeout_secs: 1,
        mission_timeout_secs: 1,
        seed: Some(11),
        pacing: PacingConfig::disabled(),
        ..EngineConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_yields_one_session() {
    let registry = SessionRegistry::new(quick_config());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create("shared", Arc::new(NullSink)) })
        })
        .collect();

    let games: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(registry.len(), 1);
    assert!(games.iter().all(|g| g.same_session(&games[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_are_serialized() {
    let registry = SessionRegistry::new(EngineConfig {
        max_players: 8,
        ..quick_config()
    });
    let game = registry.create("room", Arc::new(NullSink));

    let joins = (1..=12).map(|i| {
        let game = game.clone();
        async move {
            game.add_player(resistance_core::player::Player::new(
                format!("p{i}"),
                format!("Player{i}"),
            ))
            .await
        }
    });
    let results = join_all(joins).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 8);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::Capacity)
    );
    assert_eq!(game.info().await.unwrap().players.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_are_all_counted() {
    // Wide enough that every spawned vote lands before the window closes.
    let mut tg = TestGame::with_config(EngineConfig {
        voting_timeout_secs: 5,
        ..quick_config()
    });
    let (snapshot, leader) = tg.start_game(7).await;
    tg.propose(&leader, &team(&snapshot, 2, false)).await;

    let votes = snapshot.players.iter().map(|p| {
        let game = tg.game.clone();
        let id = p.id.clone();
        tokio::spawn(async move { game.vote(&id, true).await })
    });
    for result in join_all(votes).await {
        result.unwrap().unwrap();
    }

    match tg.wait_for("voting_done").await.1 {
        GameEvent::VotingDone { votes, majority } => {
            assert_eq!(votes.len(), 7);
            assert!(majority);
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn operations_racing_abort_succeed_or_report_not_found() {
    let mut tg = TestGame::with_config(quick_config());
    tg.start_game(5).await;

    let racers = (0..32).map(|i| {
        let game = tg.game.clone();
        tokio::spawn(async move {
            if i == 16 {
                game.abort("p1").await.map(|_| ())
            } else if i % 2 == 0 {
                game.info().await.map(|_| ())
            } else {
                game.show_players().await
            }
        })
    });

    for result in join_all(racers).await {
        match result.unwrap() {
            Ok(()) => {},
            Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
        }
    }

    tg.wait_for("aborted").await;
    assert_eq!(tg.game.state(), GameState::Idle);
    assert!(tg.registry.is_empty());
    assert_eq!(tg.game.info().await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_sessions_run_side_by_side() {
    let registry = SessionRegistry::new(quick_config());
    let games: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| registry.create(id, Arc::new(NullSink)))
        .collect();
    assert_eq!(registry.session_ids(), vec!["a", "b", "c"]);

    games[1].add_player(resistance_core::player::Player::new("x", "X")).await.unwrap();
    games[1].abort("x").await.unwrap();

    assert_eq!(registry.session_ids(), vec!["a", "c"]);
    assert!(games[0].info().await.unwrap().players.is_empty());
    assert_eq!(games[2].state(), GameState::Initialized);
}
