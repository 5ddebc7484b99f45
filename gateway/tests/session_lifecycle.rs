//! Session lifecycle integration tests.
//!
//! Exercises the `SessionManager` against the in-memory store with a manual
//! clock, so expiry is tested without sleeping.

#![allow(clippy::unwrap_used)]

use chrono::Duration as ChronoDuration;
use proptest::prelude::*;
use safectx_core::environment::Clock;
use safectx_gateway::config::SessionConfig;
use safectx_gateway::mocks::RecordingSessionStore;
use safectx_gateway::stores::InMemorySessionStore;
use safectx_gateway::{GatewayError, SessionId, SessionManager, UserId};
use safectx_testing::ManualClock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

fn manager_with(
    config: SessionConfig,
) -> (SessionManager<InMemorySessionStore, ManualClock>, ManualClock) {
    let clock = ManualClock::default();
    let manager =
        SessionManager::with_clock(InMemorySessionStore::new(), config, clock.clone());
    (manager, clock)
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let (manager, clock) = manager_with(SessionConfig::default());
    let alice: UserId = "alice".into();

    let mut session = manager.create_session(&alice).await.unwrap();
    assert_eq!(session.user_id, alice);
    assert_eq!(session.expires_at, clock.now() + ChronoDuration::hours(24));

    session.data.insert("k".to_string(), serde_json::json!("v"));
    manager.update_session(&session).await.unwrap();

    let fetched = manager.get_session(&session.id).await.unwrap();
    assert_eq!(fetched.data.get("k"), Some(&serde_json::json!("v")));

    manager.delete_session(&session.id).await.unwrap();
    assert_eq!(
        manager.get_session(&session.id).await.unwrap_err(),
        GatewayError::NotFound
    );
}

#[tokio::test]
async fn test_live_sessions_never_share_an_id() {
    let config = SessionConfig::default().with_max_sessions_per_user(50);
    let (manager, _clock) = manager_with(config);

    let mut ids = HashSet::new();
    for user in 0..10 {
        for _ in 0..50 {
            let session = manager
                .create_session(&format!("user-{user}").into())
                .await
                .unwrap();
            assert!(ids.insert(session.id));
        }
    }
    assert_eq!(ids.len(), 500);
}

#[tokio::test]
async fn test_max_sessions_performs_no_write() {
    let store = RecordingSessionStore::new();
    let config = SessionConfig::default().with_max_sessions_per_user(3);
    let manager = SessionManager::with_clock(store.clone(), config, ManualClock::default());
    let alice: UserId = "alice".into();

    for _ in 0..3 {
        manager.create_session(&alice).await.unwrap();
    }
    let writes_before = store.write_count();

    let result = manager.create_session(&alice).await;

    assert_eq!(result.unwrap_err(), GatewayError::MaxSessions);
    assert_eq!(store.write_count(), writes_before);
    assert_eq!(store.inner().len().unwrap(), 3);
}

#[tokio::test]
async fn test_expiry_boundary() {
    let timeout = Duration::from_secs(30 * 60);
    let config = SessionConfig::default().with_session_timeout(timeout);
    let (manager, clock) = manager_with(config);
    let session = manager.create_session(&"alice".into()).await.unwrap();

    clock.advance(ChronoDuration::minutes(30) - ChronoDuration::milliseconds(1));
    assert!(manager.get_session(&session.id).await.is_ok());

    clock.advance(ChronoDuration::milliseconds(1));
    assert_eq!(
        manager.get_session(&session.id).await.unwrap_err(),
        GatewayError::Expired
    );
    assert_eq!(
        manager.get_session(&session.id).await.unwrap_err(),
        GatewayError::NotFound
    );
}

#[tokio::test]
async fn test_refresh_resets_window_regardless_of_remaining_time() {
    let config = SessionConfig::default().with_session_timeout(Duration::from_secs(600));
    let (manager, clock) = manager_with(config);
    let session = manager.create_session(&"alice".into()).await.unwrap();

    for elapsed in [1, 300, 599] {
        clock.advance(ChronoDuration::seconds(elapsed));
        let refreshed = manager.refresh_session(&session.id).await.unwrap();
        assert_eq!(refreshed.expires_at, clock.now() + ChronoDuration::seconds(600));
    }
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (manager, _clock) = manager_with(SessionConfig::default());
    let session = manager.create_session(&"alice".into()).await.unwrap();

    manager.delete_session(&session.id).await.unwrap();
    manager.delete_session(&session.id).await.unwrap();
    manager.delete_session(&SessionId::generate()).await.unwrap();

    assert_eq!(
        manager.get_session(&session.id).await.unwrap_err(),
        GatewayError::NotFound
    );
    assert!(manager.list_user_sessions(&"alice".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_race_past_limit_by_default() {
    let store = RecordingSessionStore::new().yield_after_list(true);
    let config = SessionConfig::default().with_max_sessions_per_user(1);
    let manager = SessionManager::new(store.clone(), config);
    let alice: UserId = "alice".into();

    let results =
        futures::future::join_all((0..5).map(|_| manager.create_session(&alice))).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    assert!(created > 1, "expected the check-then-act race, got {created}");
    assert_eq!(store.inner().len().unwrap(), created);
}

#[tokio::test]
async fn test_strict_user_limit_closes_race() {
    let store = RecordingSessionStore::new().yield_after_list(true);
    let config = SessionConfig::default()
        .with_max_sessions_per_user(1)
        .with_strict_user_limit(true);
    let manager = SessionManager::new(store.clone(), config);
    let alice: UserId = "alice".into();

    let results =
        futures::future::join_all((0..5).map(|_| manager.create_session(&alice))).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == GatewayError::MaxSessions)
    );
    assert_eq!(store.inner().len().unwrap(), 1);
}

#[tokio::test]
async fn test_strict_limit_does_not_serialise_other_users() {
    let store = RecordingSessionStore::new().yield_after_list(true);
    let config = SessionConfig::default()
        .with_max_sessions_per_user(1)
        .with_strict_user_limit(true);
    let manager = SessionManager::new(store, config);

    let users: Vec<UserId> = (0..5).map(|i| format!("user-{i}").into()).collect();
    let results =
        futures::future::join_all(users.iter().map(|u| manager.create_session(u))).await;

    assert!(results.iter().all(Result::is_ok));
}

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    Delete(usize),
    Advance(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize).prop_map(Op::Create),
        2 => any::<usize>().prop_map(Op::Delete),
        1 => (1..120i64).prop_map(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `list_user_sessions` returns exactly the sessions that were neither
    /// deleted nor expired, with no duplicates.
    #[test]
    fn prop_index_consistency(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let config = SessionConfig::default()
                .with_session_timeout(Duration::from_secs(300))
                .with_max_sessions_per_user(1_000);
            let (manager, clock) = manager_with(config);
            let users: Vec<UserId> = (0..3).map(|i| format!("user-{i}").into()).collect();

            // user -> (session id -> expires_at)
            let mut model: HashMap<UserId, HashMap<SessionId, chrono::DateTime<chrono::Utc>>> =
                HashMap::new();
            let mut created: Vec<(UserId, SessionId)> = Vec::new();

            for op in ops {
                match op {
                    Op::Create(u) => {
                        let session = manager.create_session(&users[u]).await.unwrap();
                        model
                            .entry(users[u].clone())
                            .or_default()
                            .insert(session.id.clone(), session.expires_at);
                        created.push((users[u].clone(), session.id));
                    }
                    Op::Delete(i) if !created.is_empty() => {
                        let (user, id) = created[i % created.len()].clone();
                        manager.delete_session(&id).await.unwrap();
                        if let Some(ids) = model.get_mut(&user) {
                            ids.remove(&id);
                        }
                    }
                    Op::Delete(_) => {}
                    Op::Advance(secs) => clock.advance(ChronoDuration::seconds(secs)),
                }

                let now = clock.now();
                for user in &users {
                    let listed = manager.list_user_sessions(user).await.unwrap();
                    let listed_ids: Vec<SessionId> = listed.iter().map(|s| s.id.clone()).collect();
                    let unique: HashSet<SessionId> = listed_ids.iter().cloned().collect();
                    prop_assert_eq!(unique.len(), listed_ids.len());

                    let expected: HashSet<SessionId> = model
                        .get(user)
                        .map(|ids| {
                            ids.iter()
                                .filter(|(_, expires_at)| now < **expires_at)
                                .map(|(id, _)| id.clone())
                                .collect()
                        })
                        .unwrap_or_default();
                    prop_assert_eq!(unique, expected);
                    prop_assert!(listed.iter().all(|s| &s.user_id == user));
                }
            }
            Ok(())
        })?;
    }
}
