//! In-process session store.
//!
//! Suitable only for a single running instance: sessions live in this
//! process's memory and vanish with it. Records are never evicted by the
//! store; logical expiry is left to the `SessionManager`'s reaping reads.

use crate::error::{GatewayError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    by_user: HashMap<UserId, HashSet<SessionId>>,
}

/// In-memory session store.
///
/// The primary map and the per-user index sit behind one lock, so every
/// operation observes them consistently.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, live or not.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.sessions.len())
    }

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.sessions.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| GatewayError::Internal("Mutex lock failed".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Session> {
        self.lock()?
            .sessions
            .get(id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn create(&self, session: &Session) -> Result<()> {
        let mut inner = self.lock()?;

        if inner.sessions.contains_key(&session.id) {
            return Err(GatewayError::Conflict("Session ID already exists".to_string()));
        }

        inner
            .by_user
            .entry(session.user_id.clone())
            .or_default()
            .insert(session.id.clone());
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut inner = self.lock()?;

        let existing = inner
            .sessions
            .get_mut(&session.id)
            .ok_or(GatewayError::NotFound)?;
        super::check_immutable_fields(existing, session)?;

        *existing = session.clone();
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let mut inner = self.lock()?;

        if let Some(session) = inner.sessions.remove(id) {
            if let Some(ids) = inner.by_user.get_mut(&session.user_id) {
                ids.remove(id);
                if ids.is_empty() {
                    inner.by_user.remove(&session.user_id);
                }
            }
        }
        Ok(())
    }

    async fn list_by_user_id(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let Some(ids) = inner.by_user.get_mut(user_id) else {
            return Ok(Vec::new());
        };

        let sessions = &inner.sessions;
        ids.retain(|id| sessions.contains_key(id));

        let mut found: Vec<Session> = ids
            .iter()
            .filter_map(|id| sessions.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}
