//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionId, UserId};

/// Session store.
///
/// This trait abstracts over session persistence (in-process map or Redis).
/// The store knows nothing about expiry policy beyond what its backend offers;
/// logical expiry is decided by the `SessionManager`.
///
/// # Implementation Notes
///
/// - Each session is one record keyed by its ID
/// - Each user has an index of their session IDs
/// - `create` is the single point at which a new session becomes visible
pub trait SessionStore: Send + Sync {
    /// Get session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session not found → `GatewayError::NotFound`
    /// - Backend request fails → `GatewayError::Unavailable`
    fn get(&self, id: &SessionId) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Create session and add it to its owner's index.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session ID already exists → `GatewayError::Conflict`
    /// - Backend request fails → `GatewayError::Unavailable`
    fn create(&self, session: &Session) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Overwrite an existing session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session not found → `GatewayError::NotFound`
    /// - Owner or creation time differs from the stored record → `GatewayError::InvalidInput`
    /// - Backend request fails → `GatewayError::Unavailable`
    fn update(&self, session: &Session) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete session and its index entry.
    ///
    /// Deleting an absent session succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if backend request fails.
    fn delete(&self, id: &SessionId) -> impl std::future::Future<Output = Result<()>> + Send;

    /// List all indexed sessions for a user.
    ///
    /// Index entries whose record has vanished are pruned from the index and
    /// left out of the result.
    ///
    /// # Errors
    ///
    /// Returns error if backend request fails.
    fn list_by_user_id(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Session>>> + Send;
}
