//! Outermost fault boundary.
//!
//! A panic anywhere downstream is caught here and answered with a fixed
//! internal-error response. Nothing is retried.

use super::{GatewayResponse, RequestContext, StageFuture};
use futures::FutureExt;
use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that contains panics raised by downstream stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

/// Service produced by [`RecoveryLayer`].
#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

impl<S> Service<RequestContext> for RecoveryService<S>
where
    S: Service<RequestContext, Response = GatewayResponse, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = GatewayResponse;
    type Error = Infallible;
    type Future = StageFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: RequestContext) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let request_id = ctx.request_id();

        Box::pin(async move {
            // Downstream `call` runs inside the guarded future too.
            let guarded = AssertUnwindSafe(async move { inner.call(ctx).await }).catch_unwind();

            match guarded.await {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(
                        request_id = %request_id,
                        panic = %panic_message(payload.as_ref()),
                        "Recovered from panic in admission pipeline"
                    );
                    metrics::counter!("safectx_admission_denied_total", "stage" => "recovery")
                        .increment(1);
                    Ok(GatewayResponse::internal())
                }
            }
        })
    }
}
