//! Sensitive-field redaction.

use super::{GatewayResponse, RequestContext, StageFuture, not_decoded};
use crate::providers::Redactor;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that hands downstream a redacted copy of the decoded request.
#[derive(Clone)]
pub struct RedactLayer {
    redactor: Arc<dyn Redactor>,
}

impl RedactLayer {
    /// Create the layer.
    #[must_use]
    pub fn new(redactor: Arc<dyn Redactor>) -> Self {
        Self { redactor }
    }
}

impl<S> Layer<S> for RedactLayer {
    type Service = RedactService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RedactService {
            inner,
            redactor: Arc::clone(&self.redactor),
        }
    }
}

/// Service produced by [`RedactLayer`].
#[derive(Clone)]
pub struct RedactService<S> {
    inner: S,
    redactor: Arc<dyn Redactor>,
}

impl<S> Service<RequestContext> for RedactService<S>
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

    fn call(&mut self, mut ctx: RequestContext) -> Self::Future {
        let Some(mut request) = ctx.take_request() else {
            return not_decoded("redact");
        };

        let fields = self.redactor.apply(&mut request);
        if !fields.is_empty() {
            tracing::debug!(fields = ?fields, "Redacted sensitive fields");
        }

        Box::pin(self.inner.call(ctx.with_redacted(request, fields)))
    }
}
