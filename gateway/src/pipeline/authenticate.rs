//! Principal resolution.

use super::{GatewayResponse, RequestContext, StageFuture, deny};
use crate::providers::Authenticator;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that attaches the authenticated principal or answers 401.
///
/// The authenticator's error is logged but never shown to the caller.
#[derive(Debug)]
pub struct AuthenticateLayer<A> {
    authenticator: Arc<A>,
}

impl<A> AuthenticateLayer<A> {
    /// Create the layer.
    #[must_use]
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}

impl<A> Clone for AuthenticateLayer<A> {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

impl<S, A> Layer<S> for AuthenticateLayer<A> {
    type Service = AuthenticateService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticateService {
            inner,
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

/// Service produced by [`AuthenticateLayer`].
#[derive(Debug)]
pub struct AuthenticateService<S, A> {
    inner: S,
    authenticator: Arc<A>,
}

impl<S: Clone, A> Clone for AuthenticateService<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

impl<S, A> Service<RequestContext> for AuthenticateService<S, A>
where
    S: Service<RequestContext, Response = GatewayResponse, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    A: Authenticator + 'static,
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
        let authenticator = Arc::clone(&self.authenticator);

        Box::pin(async move {
            match authenticator.authenticate(ctx.metadata()).await {
                Ok(principal) => {
                    tracing::debug!(
                        principal = %principal.id,
                        auth_method = ?principal.auth_method,
                        "Request authenticated"
                    );
                    inner.call(ctx.with_principal(principal)).await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Authentication failed");
                    deny("authenticate", GatewayResponse::unauthorized()).await
                }
            }
        })
    }
}
