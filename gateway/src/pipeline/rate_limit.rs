//! Admission throttling by request source.

use super::{GatewayResponse, RequestContext, StageFuture, deny};
use crate::rate_limiter::RateLimiter;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that rejects requests the [`RateLimiter`] does not admit.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    /// Create the layer around a shared limiter.
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<RequestContext> for RateLimitService<S>
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
        if !self.limiter.allow(&ctx.metadata().source) {
            tracing::warn!(source = %ctx.metadata().source, "Rate limit exceeded");
            return deny("rate_limit", GatewayResponse::rate_limited());
        }

        Box::pin(self.inner.call(ctx))
    }
}
