//! Content scanning.

use super::{GatewayResponse, RequestContext, StageFuture, deny, not_decoded};
use crate::providers::Detector;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that rejects requests the [`Detector`] flags.
#[derive(Clone)]
pub struct DetectLayer {
    detector: Arc<dyn Detector>,
}

impl DetectLayer {
    /// Create the layer.
    #[must_use]
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }
}

impl<S> Layer<S> for DetectLayer {
    type Service = DetectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DetectService {
            inner,
            detector: Arc::clone(&self.detector),
        }
    }
}

/// Service produced by [`DetectLayer`].
#[derive(Clone)]
pub struct DetectService<S> {
    inner: S,
    detector: Arc<dyn Detector>,
}

impl<S> Service<RequestContext> for DetectService<S>
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
            return not_decoded("detect");
        };

        if self.detector.has_violation(request) {
            tracing::warn!(method = %request.method, "Blocked content detected");
            return deny("detect", GatewayResponse::content_policy());
        }

        Box::pin(self.inner.call(ctx))
    }
}
