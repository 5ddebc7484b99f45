//! Error types for session and admission operations.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error taxonomy for the session lifecycle and the admission pipeline.
///
/// Store-level and manager-level failures surface through this enum; pipeline
/// denials are carried as [`GatewayError::Denied`] and rendered as terminal
/// responses by the stage that produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// No record exists for the given key.
    #[error("Session not found")]
    NotFound,

    /// The record existed but is logically dead.
    #[error("Session has expired")]
    Expired,

    /// Creating another session would exceed the per-user maximum.
    #[error("Maximum number of sessions reached")]
    MaxSessions,

    /// A record with the same key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    // ═══════════════════════════════════════════════════════════
    // Admission Errors
    // ═══════════════════════════════════════════════════════════

    /// Authentication, policy or content-scan rejection.
    #[error("Request denied: {reason}")]
    Denied {
        /// Why the request was denied
        reason: String,
    },

    /// Malformed request body or configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The backing store or a remote verification call failed transiently.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The caller's deadline elapsed before the operation completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Build a [`GatewayError::Denied`] from any reason.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error means "no live session", whether the record
    /// never existed or lapsed.
    ///
    /// A networked store may evict a key before a reaping read observes it, so
    /// callers deciding liveness should treat both outcomes the same.
    ///
    /// # Examples
    ///
    /// ```
    /// # use safectx_gateway::GatewayError;
    /// assert!(GatewayError::NotFound.is_liveness_negative());
    /// assert!(GatewayError::Expired.is_liveness_negative());
    /// assert!(!GatewayError::MaxSessions.is_liveness_negative());
    /// ```
    #[must_use]
    pub const fn is_liveness_negative(&self) -> bool {
        matches!(self, Self::NotFound | Self::Expired)
    }

    /// Returns `true` if the caller may reasonably retry the operation.
    ///
    /// The gateway itself never retries; this is advice for the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// # use safectx_gateway::GatewayError;
    /// assert!(GatewayError::Unavailable("redis down".into()).is_retryable());
    /// assert!(!GatewayError::denied("policy").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Cancelled)
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<crate::config::ConfigError> for GatewayError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
