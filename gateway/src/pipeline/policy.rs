//! Policy evaluation.

use super::{GatewayResponse, RequestContext, StageFuture, deny, not_decoded};
use crate::providers::PolicyEngine;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that asks the [`PolicyEngine`] whether the request may proceed.
///
/// A `false` decision and an engine error get the same 403 but different
/// log events.
#[derive(Clone)]
pub struct PolicyLayer {
    engine: Arc<dyn PolicyEngine>,
}

impl PolicyLayer {
    /// Create the layer.
    #[must_use]
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for PolicyLayer {
    type Service = PolicyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PolicyService {
            inner,
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Service produced by [`PolicyLayer`].
#[derive(Clone)]
pub struct PolicyService<S> {
    inner: S,
    engine: Arc<dyn PolicyEngine>,
}

impl<S> Service<RequestContext> for PolicyService<S>
where
    S: Service<RequestContext, Response = GatewayResponse, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = GatewayResponse;
    type Error = Infallible;
    type Future = StageFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: RequestContext) -> Self::Future {
        let Some(request) = ctx.request() else {
            return not_decoded("policy");
        };

        match self.engine.evaluate(request) {
            Ok(true) => Box::pin(self.inner.call(ctx)),
            Ok(false) => {
                tracing::warn!(
                    method = %request.method,
                    principal = ctx.principal().map(|p| p.id.as_str()),
                    "Request denied by policy"
                );
                deny("policy", GatewayResponse::policy_denied())
            }
            Err(e) => {
                tracing::error!(
                    method = %request.method,
                    error = %e,
                    "Policy evaluation failed"
                );
                deny("policy", GatewayResponse::policy_denied())
            }
        }
    }
}
