//! Session and identity types.
//!
//! All types are `Clone` so they can be handed across stage and store
//! boundaries by value.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Number of random bytes behind a generated session ID (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new cryptographically secure random `SessionId`.
    ///
    /// Uses 256 bits from the operating system's CSPRNG, URL-safe base64
    /// encoded without padding.
    ///
    /// # Examples
    ///
    /// ```
    /// # use safectx_gateway::SessionId;
    /// let id = SessionId::generate();
    /// assert_eq!(id.as_str().len(), 43);
    /// assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Owning principal identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// User session.
///
/// `created_at` never changes after creation. `expires_at` moves forward on
/// refresh. A session observed at or after `expires_at` is dead whether or
/// not it has been removed from its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,

    /// Owning user.
    pub user_id: UserId,

    /// Session creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Session expiration timestamp.
    pub expires_at: DateTime<Utc>,

    /// Application data owned by the session, opaque to the gateway.
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl Session {
    /// Build a fresh session for `user_id` that lives for `ttl` from `now`.
    #[must_use]
    pub fn new(id: SessionId, user_id: UserId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id,
            user_id,
            created_at: now,
            expires_at: now + ttl,
            data: HashMap::new(),
        }
    }

    /// Whether the session is logically dead at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime at `now`, clamped at zero.
    #[must_use]
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Principal
// ═══════════════════════════════════════════════════════════════════════

/// How a principal was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Signed bearer token.
    Jwt,
    /// OpenID Connect.
    Oidc,
    /// SAML assertion.
    Saml,
    /// Existing gateway session.
    Session,
    /// Pre-shared static token.
    StaticToken,
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier.
    pub id: UserId,

    /// Email, when the authenticator knows it.
    pub email: Option<String>,

    /// Display name, when the authenticator knows it.
    pub name: Option<String>,

    /// Granted roles.
    pub roles: Vec<String>,

    /// Raw claims forwarded by the authenticator.
    pub claims: HashMap<String, Value>,

    /// Authentication mechanism.
    pub auth_method: AuthMethod,

    /// Session the request was admitted under, for session-bearing requests.
    pub session_id: Option<SessionId>,
}

impl Principal {
    /// Create a principal with no optional attributes.
    #[must_use]
    pub fn new(id: impl Into<UserId>, auth_method: AuthMethod) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            roles: Vec::new(),
            claims: HashMap::new(),
            auth_method,
            session_id: None,
        }
    }

    /// Set email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Add a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Attach the session the principal was resolved from.
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Whether the principal holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
