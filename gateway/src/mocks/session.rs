//! Mock session stores for testing.

use crate::error::{GatewayError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use crate::stores::InMemorySessionStore;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

/// In-memory store that counts every call.
///
/// Clones share the same records and counters. With
/// [`RecordingSessionStore::yield_after_list`] enabled, every
/// `list_by_user_id` yields to the scheduler before returning, which lets
/// concurrent creates interleave between their check and their write.
#[derive(Debug, Clone, Default)]
pub struct RecordingSessionStore {
    inner: InMemorySessionStore,
    counters: Arc<Counters>,
    yield_after_list: Arc<AtomicBool>,
}

impl RecordingSessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield after every list so concurrent callers interleave.
    #[must_use]
    pub fn yield_after_list(self, enabled: bool) -> Self {
        self.yield_after_list.store(enabled, Ordering::SeqCst);
        self
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemorySessionStore {
        &self.inner
    }

    /// Number of `get` calls.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.counters.gets.load(Ordering::SeqCst)
    }

    /// Number of `create` calls.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.counters.creates.load(Ordering::SeqCst)
    }

    /// Number of `update` calls.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.counters.updates.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    /// Number of `list_by_user_id` calls.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.counters.lists.load(Ordering::SeqCst)
    }

    /// Number of write calls (`create`, `update`, `delete`).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.create_count() + self.update_count() + self.delete_count()
    }
}

impl SessionStore for RecordingSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Session> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn create(&self, session: &Session) -> Result<()> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(session).await
    }

    async fn update(&self, session: &Session) -> Result<()> {
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(session).await
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn list_by_user_id(&self, user_id: &UserId) -> Result<Vec<Session>> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        let sessions = self.inner.list_by_user_id(user_id).await?;
        if self.yield_after_list.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(sessions)
    }
}

/// Store whose every operation fails with `GatewayError::Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSessionStore;

impl FailingSessionStore {
    /// Create a failing store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unavailable<T: Send>() -> impl Future<Output = Result<T>> + Send {
        std::future::ready(Err(GatewayError::Unavailable(
            "session store unavailable".to_string(),
        )))
    }
}

impl SessionStore for FailingSessionStore {
    fn get(&self, _id: &SessionId) -> impl Future<Output = Result<Session>> + Send {
        Self::unavailable()
    }

    fn create(&self, _session: &Session) -> impl Future<Output = Result<()>> + Send {
        Self::unavailable()
    }

    fn update(&self, _session: &Session) -> impl Future<Output = Result<()>> + Send {
        Self::unavailable()
    }

    fn delete(&self, _id: &SessionId) -> impl Future<Output = Result<()>> + Send {
        Self::unavailable()
    }

    fn list_by_user_id(
        &self,
        _user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<Session>>> + Send {
        Self::unavailable()
    }
}
