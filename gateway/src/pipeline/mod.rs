//! Admission pipeline.
//!
//! Every inbound request passes through a fixed chain of stages before any
//! business logic runs:
//!
//! ```text
//! recovery → logging → rate limit → authenticate → validate
//!          → detect → policy → redact → terminal handler
//! ```
//!
//! Each stage is a [`tower::Layer`] wrapping everything after it. A stage
//! short-circuits by answering with a [`GatewayResponse`] instead of calling
//! its inner service, so nothing registered after it ever sees the request.
//! Stages do nothing on denial beyond logging; nothing is rolled back.
//!
//! Rate limiting and authentication are skipped when not configured. The
//! order is fixed when the pipeline is built.
//!
//! # Example
//!
//! ```
//! use safectx_gateway::pipeline::{
//!     GatewayResponse, PipelineBuilder, RawRequest, RequestContext, RequestMetadata,
//! };
//! use serde_json::json;
//! use std::convert::Infallible;
//!
//! # tokio_test::block_on(async {
//! let pipeline = PipelineBuilder::new().build(tower::service_fn(|ctx: RequestContext| async move {
//!     let method = ctx.request().map(|r| r.method.clone()).unwrap_or_default();
//!     Ok::<_, Infallible>(GatewayResponse::ok(json!({ "method": method })))
//! }));
//!
//! let raw = RawRequest::json(
//!     RequestMetadata::new("10.0.0.1:5000"),
//!     &json!({ "id": "1", "method": "tools/list" }),
//! );
//! let response = pipeline.run(raw).await;
//! assert!(response.is_success());
//! # });
//! ```

mod authenticate;
mod context;
mod detect;
mod logging;
mod policy;
mod rate_limit;
mod recovery;
mod redact;
mod response;
mod validate;

pub use authenticate::{AuthenticateLayer, AuthenticateService};
pub use context::{RawRequest, RequestContext, RequestMetadata};
pub use detect::{DetectLayer, DetectService};
pub use logging::{LoggingLayer, LoggingService};
pub use policy::{PolicyLayer, PolicyService};
pub use rate_limit::{RateLimitLayer, RateLimitService};
pub use recovery::{RecoveryLayer, RecoveryService};
pub use redact::{RedactLayer, RedactService};
pub use response::GatewayResponse;
pub use validate::{ValidateLayer, ValidateService};

use crate::providers::{
    Authenticator, DefaultPolicyEngine, Detector, FieldRedactor, PatternDetector, PolicyEngine,
    Redactor,
};
use crate::rate_limiter::RateLimiter;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

/// Future returned by every stage service.
pub type StageFuture = BoxFuture<'static, Result<GatewayResponse, Infallible>>;

/// A type-erased stage chain.
pub type BoxedStage = BoxCloneService<RequestContext, GatewayResponse, Infallible>;

type StageWrapper = Box<dyn FnOnce(BoxedStage) -> BoxedStage + Send>;

/// Answer immediately, counting the denial against `stage`.
fn deny(stage: &'static str, response: GatewayResponse) -> StageFuture {
    metrics::counter!("safectx_admission_denied_total", "stage" => stage).increment(1);
    Box::pin(futures::future::ready(Ok(response)))
}

/// A stage that needs the decoded request ran ahead of validation.
fn not_decoded(stage: &'static str) -> StageFuture {
    tracing::error!(stage = stage, "Stage reached without a decoded request");
    deny(stage, GatewayResponse::internal())
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    rate_limiter: Option<Arc<RateLimiter>>,
    authenticate: Option<StageWrapper>,
    policy: Arc<dyn PolicyEngine>,
    detector: Arc<dyn Detector>,
    redactor: Arc<dyn Redactor>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Start with no rate limiting, no authentication, an allow-all policy
    /// and the default detector and redactor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rate_limiter: None,
            authenticate: None,
            policy: Arc::new(DefaultPolicyEngine),
            detector: Arc::new(PatternDetector::default()),
            redactor: Arc::new(FieldRedactor::default()),
        }
    }

    /// Throttle requests through a shared limiter.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Require every request to authenticate.
    #[must_use]
    pub fn authenticator<A: Authenticator + 'static>(mut self, authenticator: A) -> Self {
        let layer = AuthenticateLayer::new(authenticator);
        self.authenticate = Some(Box::new(move |inner: BoxedStage| -> BoxedStage {
            BoxCloneService::new(layer.layer(inner))
        }));
        self
    }

    /// Set policy engine.
    #[must_use]
    pub fn policy(mut self, engine: impl PolicyEngine + 'static) -> Self {
        self.policy = Arc::new(engine);
        self
    }

    /// Set content detector.
    #[must_use]
    pub fn detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    /// Set redactor.
    #[must_use]
    pub fn redactor(mut self, redactor: impl Redactor + 'static) -> Self {
        self.redactor = Arc::new(redactor);
        self
    }

    /// Wrap `handler` in the full stage chain.
    ///
    /// The handler only sees requests every stage admitted, already decoded
    /// and redacted. The raw body is gone by then.
    #[must_use]
    pub fn build<H>(self, handler: H) -> Pipeline
    where
        H: Service<RequestContext, Response = GatewayResponse, Error = Infallible>
            + Clone
            + Send
            + 'static,
        H::Future: Send + 'static,
    {
        // Innermost first.
        let mut chain = BoxCloneService::new(handler);
        chain = BoxCloneService::new(RedactLayer::new(self.redactor).layer(chain));
        chain = BoxCloneService::new(PolicyLayer::new(self.policy).layer(chain));
        chain = BoxCloneService::new(DetectLayer::new(self.detector).layer(chain));
        chain = BoxCloneService::new(ValidateLayer.layer(chain));
        if let Some(authenticate) = self.authenticate {
            chain = authenticate(chain);
        }
        if let Some(limiter) = self.rate_limiter {
            chain = BoxCloneService::new(RateLimitLayer::new(limiter).layer(chain));
        }
        chain = BoxCloneService::new(LoggingLayer.layer(chain));
        chain = BoxCloneService::new(RecoveryLayer.layer(chain));

        Pipeline { chain }
    }
}

/// A built admission pipeline.
///
/// Cheap to clone; clones share every collaborator.
#[derive(Clone)]
pub struct Pipeline {
    chain: BoxedStage,
}

impl Pipeline {
    /// Admit (or reject) one request.
    ///
    /// If the request carries a deadline, the whole chain runs under it;
    /// when it elapses the chain is dropped (abandoning any in-flight store
    /// or verification call) and a 504 is returned.
    pub fn run(&self, raw: RawRequest) -> impl Future<Output = GatewayResponse> + Send + 'static {
        let chain = self.chain.clone();
        async move {
            let deadline = raw.metadata.deadline;
            let ctx = RequestContext::new(raw);
            let request_id = ctx.request_id();
            let call = chain.oneshot(ctx);

            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(request_id = %request_id, "Request deadline exceeded");
                        metrics::counter!("safectx_admission_denied_total", "stage" => "deadline")
                            .increment(1);
                        return GatewayResponse::cancelled();
                    }
                },
                None => call.await,
            };

            match result {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    }
}
