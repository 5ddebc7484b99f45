//! Authenticator trait and built-in authenticators.
//!
//! Credential verification (signatures, key retrieval, claim schemas) lives
//! outside the gateway core. The pipeline only sees this narrow interface.

use crate::error::{GatewayError, Result};
use crate::manager::SessionManager;
use crate::pipeline::RequestMetadata;
use crate::providers::SessionStore;
use crate::state::{AuthMethod, Principal, SessionId};
use safectx_core::environment::Clock;
use std::collections::HashMap;
use std::sync::Arc;

/// Header carrying a session ID for session-bearing requests.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Authenticator.
///
/// The pipeline treats any error as "unauthenticated" and never inspects it.
pub trait Authenticator: Send + Sync {
    /// Resolve the principal behind a request.
    ///
    /// # Errors
    ///
    /// Returns error if the request carries no usable credential, or if the
    /// remote verification call fails.
    fn authenticate(
        &self,
        metadata: &RequestMetadata,
    ) -> impl std::future::Future<Output = Result<Principal>> + Send;
}

impl<A: Authenticator> Authenticator for Arc<A> {
    fn authenticate(
        &self,
        metadata: &RequestMetadata,
    ) -> impl std::future::Future<Output = Result<Principal>> + Send {
        (**self).authenticate(metadata)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// Returns `GatewayError::Denied` if the header is missing or malformed.
pub fn bearer_token(metadata: &RequestMetadata) -> Result<&str> {
    let header = metadata
        .header(http::header::AUTHORIZATION.as_str())
        .ok_or_else(|| GatewayError::denied("missing authorization header"))?;

    match header.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(GatewayError::denied("invalid authorization header format")),
    }
}

/// Authenticator backed by a fixed table of bearer tokens.
///
/// Useful for service-to-service callers and for local development.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Create an authenticator with no tokens (rejects everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, metadata: &RequestMetadata) -> Result<Principal> {
        let token = bearer_token(metadata)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| GatewayError::denied("unknown bearer token"))
    }
}

/// Authenticator that admits requests carrying a live session ID.
///
/// Reads [`SESSION_ID_HEADER`], resolves it through the `SessionManager`
/// (so expired sessions are reaped on the way) and optionally slides the
/// session's expiry forward.
pub struct SessionAuthenticator<S, C> {
    manager: Arc<SessionManager<S, C>>,
    refresh_on_access: bool,
}

impl<S, C> SessionAuthenticator<S, C> {
    /// Create a session authenticator.
    #[must_use]
    pub const fn new(manager: Arc<SessionManager<S, C>>) -> Self {
        Self {
            manager,
            refresh_on_access: false,
        }
    }

    /// Refresh the session every time it authenticates a request.
    #[must_use]
    pub const fn with_refresh_on_access(mut self, refresh: bool) -> Self {
        self.refresh_on_access = refresh;
        self
    }
}

impl<S, C> Clone for SessionAuthenticator<S, C> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            refresh_on_access: self.refresh_on_access,
        }
    }
}

impl<S, C> Authenticator for SessionAuthenticator<S, C>
where
    S: SessionStore,
    C: Clock,
{
    async fn authenticate(&self, metadata: &RequestMetadata) -> Result<Principal> {
        let session_id = metadata
            .header(SESSION_ID_HEADER)
            .map(|raw| SessionId(raw.trim().to_string()))
            .filter(|id| !id.as_str().is_empty())
            .ok_or_else(|| GatewayError::denied("missing session header"))?;

        let session = if self.refresh_on_access {
            self.manager.refresh_session(&session_id).await?
        } else {
            self.manager.get_session(&session_id).await?
        };

        Ok(Principal::new(session.user_id, AuthMethod::Session).with_session(session.id))
    }
}
