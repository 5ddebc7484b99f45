//! Session store implementations.
//!
//! - **In-memory** - single-instance store behind one lock
//! - **Redis** - networked store with store-side TTL and a per-user index set
//! - **Backend** - configuration-selected choice between the two

pub mod backend;
pub mod memory;
pub mod session_redis;

// Re-exports
pub use backend::SessionBackend;
pub use memory::InMemorySessionStore;
pub use session_redis::RedisSessionStore;

use crate::error::{GatewayError, Result};
use crate::state::Session;

/// Reject an update that would change a session's owner or creation time.
///
/// Shared by every store so a stale or forged record can't move a session to
/// another user.
pub(crate) fn check_immutable_fields(existing: &Session, updated: &Session) -> Result<()> {
    if existing.user_id != updated.user_id {
        tracing::error!(
            session_id = %updated.id,
            existing_user_id = %existing.user_id,
            new_user_id = %updated.user_id,
            "Attempt to change immutable user_id"
        );
        return Err(GatewayError::InvalidInput(
            "Cannot change session user_id (immutable)".into(),
        ));
    }

    if existing.created_at != updated.created_at {
        tracing::error!(
            session_id = %updated.id,
            "Attempt to change immutable created_at"
        );
        return Err(GatewayError::InvalidInput(
            "Cannot change session created_at (immutable)".into(),
        ));
    }

    Ok(())
}
