//! Request logging.
//!
//! Opens an `admission` span around everything downstream and logs the
//! final status and latency.

use super::{GatewayResponse, RequestContext, StageFuture};
use std::convert::Infallible;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

/// Layer that logs each request and its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S> Service<RequestContext> for LoggingService<S>
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

        let span = tracing::info_span!(
            "admission",
            request_id = %ctx.request_id(),
            source = %ctx.metadata().source,
            route = %ctx.metadata().route,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                tracing::debug!(body_bytes = ctx.body().len(), "Request received");

                let response = inner.call(ctx).await?;

                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(
                    status = response.status.as_u16(),
                    code = response.code().unwrap_or("OK"),
                    latency_ms = latency_ms,
                    "Request completed"
                );
                metrics::counter!(
                    "safectx_requests_total",
                    "status" => response.status.as_u16().to_string()
                )
                .increment(1);

                Ok(response)
            }
            .instrument(span),
        )
    }
}
