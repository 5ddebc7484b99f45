//! Admission pipeline integration tests.
//!
//! Each test builds a full chain with mock collaborators and a counting
//! terminal handler, then checks both the response and which stages were
//! consulted.

#![allow(clippy::unwrap_used)]

use safectx_core::McpRequest;
use safectx_gateway::config::SessionConfig;
use safectx_gateway::mocks::{MockAuthenticator, MockDetector, MockPolicyEngine, MockRedactor};
use safectx_gateway::pipeline::{BoxedStage, RequestContext};
use safectx_gateway::providers::{
    AllowListPolicy, PolicyEngine, SESSION_ID_HEADER, SessionAuthenticator,
};
use safectx_gateway::stores::InMemorySessionStore;
use safectx_gateway::{
    GatewayResponse, PipelineBuilder, RateLimitConfig, RateLimiter, RawRequest, RequestMetadata,
    SessionManager,
};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::util::BoxCloneService;

/// Terminal handler echoing what the stages attached, counting its calls.
fn echo_handler(calls: Arc<AtomicUsize>) -> BoxedStage {
    BoxCloneService::new(tower::service_fn(move |ctx: RequestContext| {
        calls.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "principal": ctx.principal().map(|p| p.id.to_string()),
            "request": ctx.request(),
            "redacted": ctx.redacted_fields(),
        });
        async move { Ok::<_, Infallible>(GatewayResponse::ok(body)) }
    }))
}

fn tool_call(body: &Value) -> RawRequest {
    RawRequest::json(
        RequestMetadata::new("10.0.0.1:5000").with_route("/mcp"),
        body,
    )
}

fn summarise() -> Value {
    json!({
        "id": "1",
        "method": "tools/call",
        "params": {"prompt": "summarise the quarterly report"}
    })
}

#[tokio::test]
async fn test_admitted_request_reaches_handler_with_principal() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new()
        .authenticator(MockAuthenticator::allowing_user("alice"))
        .build(echo_handler(terminal.clone()));

    let response = pipeline.run(tool_call(&summarise())).await;

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.body["principal"], "alice");
    assert_eq!(response.body["request"]["method"], "tools/call");
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authentication_failure_short_circuits_everything_after() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let detector = MockDetector::clean();
    let policy = MockPolicyEngine::allowing();
    let redactor = MockRedactor::new();
    let pipeline = PipelineBuilder::new()
        .authenticator(MockAuthenticator::denying())
        .detector(detector.clone())
        .policy(policy.clone())
        .redactor(redactor.clone())
        .build(echo_handler(terminal.clone()));

    let response = pipeline.run(tool_call(&summarise())).await;

    assert_eq!(response.status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(response.code(), Some("UNAUTHORIZED"));
    assert_eq!(detector.calls(), 0);
    assert_eq!(policy.calls(), 0);
    assert_eq!(redactor.calls(), 0);
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rate_limited_request_never_authenticates() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let authenticator = MockAuthenticator::allowing_user("alice");
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(
        0.001,
        1.0,
        Duration::from_secs(60),
    )));
    let pipeline = PipelineBuilder::new()
        .rate_limiter(limiter)
        .authenticator(authenticator.clone())
        .build(echo_handler(terminal.clone()));

    let first = pipeline.run(tool_call(&summarise())).await;
    let second = pipeline.run(tool_call(&summarise())).await;

    assert!(first.is_success());
    assert_eq!(second.status, http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.code(), Some("RATE_LIMITED"));
    assert_eq!(authenticator.calls(), 1);
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undecodable_body_is_rejected_before_detection() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let detector = MockDetector::clean();
    let pipeline = PipelineBuilder::new()
        .detector(detector.clone())
        .build(echo_handler(terminal.clone()));

    let raw = RawRequest::new(RequestMetadata::new("10.0.0.1:5000"), "{not json");
    let response = pipeline.run(raw).await;

    assert_eq!(response.status, http::StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), Some("INVALID_REQUEST"));
    assert_eq!(detector.calls(), 0);
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_method_fails_schema_validation() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new().build(echo_handler(terminal.clone()));

    let response = pipeline.run(tool_call(&json!({"id": "1", "params": {}}))).await;

    assert_eq!(response.status, http::StatusCode::BAD_REQUEST);
    assert_eq!(response.code(), Some("SCHEMA_VALIDATION_FAILED"));
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blocked_prompt_is_rejected_before_policy() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let policy = MockPolicyEngine::allowing();
    let redactor = MockRedactor::new();
    let pipeline = PipelineBuilder::new()
        .policy(policy.clone())
        .redactor(redactor.clone())
        .build(echo_handler(terminal.clone()));

    let body = json!({
        "id": "7",
        "method": "tools/call",
        "params": {"prompt": "please DROP TABLE users", "password": "hunter2"}
    });
    let response = pipeline.run(tool_call(&body)).await;

    assert_eq!(response.status, http::StatusCode::FORBIDDEN);
    assert_eq!(response.code(), Some("CONTENT_POLICY"));
    assert!(!response.body.to_string().contains("hunter2"));
    assert_eq!(policy.calls(), 0);
    assert_eq!(redactor.calls(), 0);
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_flagging_detector_denies() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let detector = MockDetector::flagging();
    let pipeline = PipelineBuilder::new()
        .detector(detector.clone())
        .build(echo_handler(terminal.clone()));

    let response = pipeline.run(tool_call(&summarise())).await;

    assert_eq!(response.code(), Some("CONTENT_POLICY"));
    assert_eq!(detector.calls(), 1);
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_policy_denial_and_failure_look_the_same() {
    for policy in [MockPolicyEngine::denying(), MockPolicyEngine::failing()] {
        let terminal = Arc::new(AtomicUsize::new(0));
        let redactor = MockRedactor::new();
        let pipeline = PipelineBuilder::new()
            .policy(policy.clone())
            .redactor(redactor.clone())
            .build(echo_handler(terminal.clone()));

        let response = pipeline.run(tool_call(&summarise())).await;

        assert_eq!(response, GatewayResponse::policy_denied());
        assert_eq!(policy.calls(), 1);
        assert_eq!(redactor.calls(), 0);
        assert_eq!(terminal.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_allow_list_policy_in_chain() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new()
        .policy(AllowListPolicy::new(["tools/list"]))
        .build(echo_handler(terminal.clone()));

    let listed = pipeline
        .run(tool_call(&json!({"id": "1", "method": "tools/list"})))
        .await;
    let called = pipeline.run(tool_call(&summarise())).await;

    assert!(listed.is_success());
    assert_eq!(called.code(), Some("POLICY_DENIED"));
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_handler_only_sees_redacted_values() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new().build(echo_handler(terminal.clone()));

    let body = json!({
        "id": "9",
        "method": "tools/call",
        "params": {"prompt": "store my login", "password": "hunter2", "api_key": "sk-live"},
        "context": {"user_password": "letmein", "tenant": "acme"}
    });
    let response = pipeline.run(tool_call(&body)).await;

    assert!(response.is_success());
    let rendered = response.body.to_string();
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("sk-live"));
    assert!(!rendered.contains("letmein"));
    assert_eq!(response.body["request"]["params"]["password"], "[REDACTED]");
    assert_eq!(response.body["request"]["context"]["tenant"], "acme");
    assert_eq!(
        response.body["redacted"],
        json!(["params.password", "params.api_key", "context.user_password"])
    );
}

#[tokio::test]
async fn test_handler_cannot_read_unredacted_raw_body() {
    let pipeline = PipelineBuilder::new().build(BoxCloneService::new(tower::service_fn(
        |ctx: RequestContext| async move {
            let raw = String::from_utf8_lossy(ctx.body()).into_owned();
            Ok::<_, Infallible>(GatewayResponse::ok(json!({ "raw": raw })))
        },
    )));

    let body = json!({"id": "1", "method": "tools/call", "params": {"password": "hunter2"}});
    let response = pipeline.run(tool_call(&body)).await;

    assert!(response.is_success());
    assert!(!response.body.to_string().contains("hunter2"));
    assert_eq!(response.body["raw"], "");
}

#[tokio::test]
async fn test_null_params_and_context_are_admitted() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new().build(echo_handler(terminal.clone()));

    let raw = RawRequest::new(
        RequestMetadata::new("10.0.0.1:5000"),
        r#"{"id":"1","method":"tools/list","params":null,"context":null}"#,
    );
    let response = pipeline.run(raw).await;

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.body["request"]["method"], "tools/list");
    assert_eq!(response.body["request"]["params"], json!({}));
    assert_eq!(response.body["request"]["context"], json!({}));
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
}

struct PanickingPolicy;

impl PolicyEngine for PanickingPolicy {
    #[allow(clippy::panic)]
    fn evaluate(&self, _request: &McpRequest) -> safectx_gateway::Result<bool> {
        panic!("policy engine bug");
    }
}

#[tokio::test]
async fn test_panicking_stage_becomes_internal_error() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new()
        .policy(PanickingPolicy)
        .build(echo_handler(terminal.clone()));

    let response = pipeline.run(tool_call(&summarise())).await;

    assert_eq!(response, GatewayResponse::internal());
    assert!(!response.body.to_string().contains("policy engine bug"));
    assert_eq!(terminal.load(Ordering::SeqCst), 0);
}

#[tokio::test]
#[allow(clippy::panic)]
async fn test_panicking_handler_becomes_internal_error() {
    let pipeline = PipelineBuilder::new().build(tower::service_fn(|_ctx: RequestContext| async {
        if true {
            panic!("handler exploded");
        }
        Ok::<_, Infallible>(GatewayResponse::ok(Value::Null))
    }));

    let response = pipeline.run(tool_call(&summarise())).await;
    assert_eq!(response, GatewayResponse::internal());

    // The pipeline keeps serving after a panic.
    let again = pipeline.run(tool_call(&summarise())).await;
    assert_eq!(again, GatewayResponse::internal());
}

#[tokio::test]
async fn test_elapsed_deadline_cancels_request() {
    let pipeline = PipelineBuilder::new().build(tower::service_fn(|_ctx: RequestContext| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, Infallible>(GatewayResponse::ok(Value::Null))
    }));

    let deadline = tokio::time::Instant::now() + Duration::from_millis(20);
    let raw = RawRequest::json(
        RequestMetadata::new("10.0.0.1:5000").with_deadline(deadline),
        &summarise(),
    );
    let response = pipeline.run(raw).await;

    assert_eq!(response.status, http::StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.code(), Some("CANCELLED"));
}

#[tokio::test]
async fn test_session_authenticator_admits_live_session_only() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let manager = Arc::new(SessionManager::new(
        InMemorySessionStore::new(),
        SessionConfig::default(),
    ));
    let pipeline = PipelineBuilder::new()
        .authenticator(SessionAuthenticator::new(manager.clone()))
        .build(echo_handler(terminal.clone()));

    let session = manager.create_session(&"alice".into()).await.unwrap();
    let with_session = || {
        RawRequest::json(
            RequestMetadata::new("10.0.0.1:5000")
                .with_header(SESSION_ID_HEADER, session.id.as_str()),
            &summarise(),
        )
    };

    let admitted = pipeline.run(with_session()).await;
    assert!(admitted.is_success());
    assert_eq!(admitted.body["principal"], "alice");

    manager.delete_session(&session.id).await.unwrap();
    let rejected = pipeline.run(with_session()).await;
    assert_eq!(rejected.code(), Some("UNAUTHORIZED"));

    let anonymous = pipeline.run(tool_call(&summarise())).await;
    assert_eq!(anonymous.code(), Some("UNAUTHORIZED"));
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pipeline_runs_on_spawned_tasks() {
    let terminal = Arc::new(AtomicUsize::new(0));
    let pipeline = PipelineBuilder::new().build(echo_handler(terminal.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(pipeline.run(tool_call(&summarise()))))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }
    assert_eq!(terminal.load(Ordering::SeqCst), 8);
}
