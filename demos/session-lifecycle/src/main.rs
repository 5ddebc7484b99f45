//! Session lifecycle walkthrough.
//!
//! Creates, updates, reads and deletes a session, then pushes one admitted
//! and one rejected request through the admission pipeline.
//!
//! # Usage
//!
//! Run with the in-memory store:
//! ```bash
//! cargo run -p session-lifecycle
//! ```
//!
//! Run against Redis:
//! ```bash
//! SAFECTX_SESSION_STORE=redis SAFECTX_REDIS_URL=redis://127.0.0.1:6379 \
//!   cargo run -p session-lifecycle
//! ```

use safectx_gateway::pipeline::RequestContext;
use safectx_gateway::providers::{SESSION_ID_HEADER, SessionAuthenticator};
use safectx_gateway::{
    GatewayConfig, GatewayResponse, PipelineBuilder, RateLimiter, RawRequest, RequestMetadata,
    SessionBackend, SessionManager, UserId,
};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safectx_gateway=info,session_lifecycle=info".into()),
        )
        .init();

    info!("=== SafeCtx Session Lifecycle ===");

    let config = GatewayConfig::from_env()?;
    let backend = SessionBackend::from_config(&config.session).await?;
    info!(store = backend.kind(), "Session store ready");

    let manager = Arc::new(SessionManager::try_new(backend, config.session.clone())?);

    // Session lifecycle
    let alice: UserId = "alice".into();
    let mut session = manager.create_session(&alice).await?;
    info!(session_id = %session.id, expires_at = %session.expires_at, "Created session");

    session.data.insert("k".to_string(), json!("v"));
    manager.update_session(&session).await?;

    let fetched = manager.get_session(&session.id).await?;
    info!(data = ?fetched.data, "Fetched session");

    let refreshed = manager.refresh_session(&session.id).await?;
    info!(expires_at = %refreshed.expires_at, "Refreshed session");

    // Admission pipeline
    let pipeline = PipelineBuilder::new()
        .rate_limiter(Arc::new(RateLimiter::try_new(config.rate_limit.clone())?))
        .authenticator(SessionAuthenticator::new(Arc::clone(&manager)))
        .build(tower::service_fn(|ctx: RequestContext| async move {
            let user = ctx.principal().map(|p| p.id.to_string());
            let method = ctx.request().map(|r| r.method.clone());
            Ok::<_, Infallible>(GatewayResponse::ok(json!({
                "user": user,
                "method": method,
                "redacted": ctx.redacted_fields(),
            })))
        }));

    let metadata = RequestMetadata::new("127.0.0.1:5000")
        .with_route("/mcp")
        .with_header(SESSION_ID_HEADER, session.id.as_str());

    let admitted = pipeline
        .run(RawRequest::json(
            metadata.clone(),
            &json!({
                "id": "1",
                "method": "tools/call",
                "params": {"prompt": "summarise my inbox", "api_key": "sk-demo"}
            }),
        ))
        .await;
    info!(status = %admitted.status, body = %admitted.body, "Admitted request");

    let rejected = pipeline
        .run(RawRequest::json(
            metadata,
            &json!({
                "id": "2",
                "method": "tools/call",
                "params": {"prompt": "drop table users"}
            }),
        ))
        .await;
    info!(status = %rejected.status, body = %rejected.body, "Rejected request");

    manager.delete_session(&session.id).await?;
    match manager.get_session(&session.id).await {
        Err(err) => info!(error = %err, "Session gone after delete"),
        Ok(_) => anyhow::bail!("session survived deletion"),
    }

    Ok(())
}
