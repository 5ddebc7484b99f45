//! Body decoding and structural validation.

use super::{GatewayResponse, RequestContext, StageFuture, deny};
use safectx_core::McpRequest;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that decodes the body into an [`McpRequest`] and checks it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateLayer;

impl<S> Layer<S> for ValidateLayer {
    type Service = ValidateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidateService { inner }
    }
}

/// Service produced by [`ValidateLayer`].
#[derive(Debug, Clone)]
pub struct ValidateService<S> {
    inner: S,
}

impl<S> Service<RequestContext> for ValidateService<S>
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
        let request: McpRequest = match serde_json::from_slice(ctx.body()) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable request body");
                return deny("validate", GatewayResponse::invalid_request("Invalid request body"));
            }
        };

        if let Err(e) = request.validate() {
            tracing::debug!(error = %e, "Request failed schema validation");
            return deny("validate", GatewayResponse::schema_violation(e.to_string()));
        }

        Box::pin(self.inner.call(ctx.with_request(request)))
    }
}
