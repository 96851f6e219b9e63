//! Race-condition coverage: idempotent creation under contention, the
//! one-mover-at-a-time guarantee, and bot-vs-bot sessions running to
//! completion side by side.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tourney_engine::game::{GameKind, MovePayload};
use tourney_web::registry::Lifecycle;
use tourney_web::AppContext;

#[tokio::test]
async fn concurrent_create_or_get_returns_one_session() {
    let ctx = AppContext::new_for_tests();
    let registry = ctx.registry();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .create_or_get("shared", GameKind::Chess, &["alice".to_string()])
                .expect("create or get")
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.expect("join task"));
    }
    assert_eq!(ids.len(), 1, "one active session per tournament");
    assert_eq!(registry.active_sessions().len(), 1);
}

#[tokio::test]
async fn distinct_tournaments_get_distinct_sessions() {
    let ctx = AppContext::new_for_tests();
    let registry = ctx.registry();

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .create_or_get(
                    &format!("t-{i}"),
                    GameKind::TicTacToe,
                    &["a".to_string(), "b".to_string()],
                )
                .expect("create")
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.expect("join task")));
    }
    assert_eq!(registry.active_sessions().len(), 8);
}

#[tokio::test]
async fn at_most_one_racing_move_wins_the_turn() {
    let ctx = AppContext::new_for_tests();
    let registry = ctx.registry();
    let id = registry
        .create_or_get(
            "race",
            GameKind::TicTacToe,
            &["a".to_string(), "b".to_string()],
        )
        .expect("create");
    registry.start(&id, GameKind::TicTacToe).expect("start");

    // Two moves for the same seat race; the turn flips after the first,
    // so exactly one can be accepted
    let mut handles = Vec::new();
    for cell in [0usize, 1] {
        let registry = Arc::clone(&registry);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            registry
                .apply_move(&id, GameKind::TicTacToe, "a", &MovePayload::Mark { cell })
                .is_ok()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.expect("join task") {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn bot_only_sessions_play_to_completion_in_parallel() {
    let ctx = AppContext::new_for_tests();
    let registry = ctx.registry();

    let mut ids = Vec::new();
    for i in 0..2 {
        let id = registry
            .create_or_get(&format!("bots-{i}"), GameKind::TicTacToe, &[])
            .expect("create");
        registry.start(&id, GameKind::TicTacToe).expect("start");
        ids.push(id);
    }

    // Worst case: nine moves at up to 1.5 s think-delay each
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    for id in &ids {
        loop {
            let info = registry.session_info(id).expect("info");
            if info.lifecycle == Lifecycle::Ended {
                let result = registry.get_result(id).expect("result").expect("present");
                assert_eq!(result.podium.len(), 2);
                assert!(result.podium.iter().all(|p| p.starts_with("Bot_")));
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "bot game {id} did not finish in time"
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
