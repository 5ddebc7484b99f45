//! Session lifecycle against a live Redis.
//!
//! Run with: `cargo test -p safectx-gateway --test redis_backend -- --ignored`
//! (expects Redis on `REDIS_URL`, default `redis://127.0.0.1:6379`).

#![allow(clippy::unwrap_used)]

use safectx_gateway::config::{SessionConfig, StoreConfig};
use safectx_gateway::{GatewayError, SessionBackend, SessionManager, UserId};
use std::time::Duration;

fn redis_config() -> SessionConfig {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    SessionConfig::default()
        .with_max_sessions_per_user(2)
        .with_session_timeout(Duration::from_secs(60))
        .with_store(StoreConfig::Redis {
            url,
            namespace: format!("safectx-it-{}", uuid::Uuid::new_v4()),
        })
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_manager_over_redis_backend() {
    let config = redis_config();
    let backend = SessionBackend::from_config(&config).await.unwrap();
    assert_eq!(backend.kind(), "redis");

    let manager = SessionManager::new(backend, config);
    let alice: UserId = format!("alice-{}", uuid::Uuid::new_v4()).into();

    let mut first = manager.create_session(&alice).await.unwrap();
    let second = manager.create_session(&alice).await.unwrap();
    assert_eq!(
        manager.create_session(&alice).await.unwrap_err(),
        GatewayError::MaxSessions
    );

    first.data.insert("k".to_string(), serde_json::json!("v"));
    manager.update_session(&first).await.unwrap();
    let fetched = manager.get_session(&first.id).await.unwrap();
    assert_eq!(fetched.data.get("k"), Some(&serde_json::json!("v")));

    manager.delete_session(&first.id).await.unwrap();
    assert_eq!(
        manager.get_session(&first.id).await.unwrap_err(),
        GatewayError::NotFound
    );

    let remaining = manager.list_user_sessions(&alice).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);

    manager.delete_session(&second.id).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_redis_is_unavailable() {
    let config = SessionConfig::default().with_store(StoreConfig::Redis {
        url: "redis://127.0.0.1:1".to_string(),
        namespace: "safectx".to_string(),
    });

    let result = SessionBackend::from_config(&config).await;

    assert!(matches!(result, Err(GatewayError::Unavailable(_))));
}
