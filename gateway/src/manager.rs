//! Session lifecycle manager.
//!
//! Orchestrates session creation, lookup with expiry check, refresh,
//! deletion and the per-user session maximum, delegating persistence to a
//! [`SessionStore`].
//!
//! # Expiry
//!
//! Expiry is read-triggered: a session observed at or after its `expires_at`
//! is deleted by the read that observed it. There is no background sweep.
//! A networked store may already have evicted the record on its own, so
//! callers deciding liveness should treat `NotFound` and `Expired` alike
//! (see [`GatewayError::is_liveness_negative`]).
//!
//! # Concurrency
//!
//! `create_session` is a check-then-act sequence. By default two concurrent
//! creates for the same user can both pass the maximum check before either
//! writes. With [`SessionConfig::strict_user_limit`] the sequence runs under
//! a per-user lock, which closes the race within one process only.

use crate::config::SessionConfig;
use crate::error::{GatewayError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use chrono::{DateTime, Utc};
use safectx_core::environment::{Clock, SystemClock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Run `fut`, giving up at `deadline`.
///
/// Dropping the future stops waiting on any in-flight store call; a mutation
/// already sent to the store is not rolled back.
///
/// # Errors
///
/// Returns `GatewayError::Cancelled` if the deadline elapses first, otherwise
/// whatever `fut` returns.
pub async fn with_deadline<T, F>(deadline: Option<tokio::time::Instant>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| GatewayError::Cancelled)?,
        None => fut.await,
    }
}

/// Session lifecycle manager.
///
/// # Type Parameters
///
/// - `S`: Session store
/// - `C`: Clock, so tests can control time
pub struct SessionManager<S, C = SystemClock> {
    store: S,
    config: SessionConfig,
    clock: C,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: SessionStore> SessionManager<S, SystemClock> {
    /// Create a manager reading wall-clock time.
    #[must_use]
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }

    /// Create a manager reading wall-clock time, after checking `config`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidInput` if [`SessionConfig::validate`] fails.
    pub fn try_new(store: S, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(store, config))
    }
}

impl<S, C> SessionManager<S, C>
where
    S: SessionStore,
    C: Clock,
{
    /// Create a manager with an explicit clock.
    ///
    /// `config` is taken as given: a zero maximum refuses every create and a
    /// zero timeout yields sessions that are expired on first read.
    #[must_use]
    pub fn with_clock(store: S, config: SessionConfig, clock: C) -> Self {
        Self {
            store,
            config,
            clock,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The manager's configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create a new session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The user already holds the maximum number of live sessions →
    ///   `GatewayError::MaxSessions` (nothing is written)
    /// - The store fails → `GatewayError::Unavailable`
    pub async fn create_session(&self, user_id: &UserId) -> Result<Session> {
        if self.config.strict_user_limit {
            let lock = self.user_lock(user_id)?;
            let _guard = lock.lock().await;
            self.create_unguarded(user_id).await
        } else {
            self.create_unguarded(user_id).await
        }
    }

    async fn create_unguarded(&self, user_id: &UserId) -> Result<Session> {
        let existing = self.list_user_sessions(user_id).await?;

        if existing.len() >= self.config.max_sessions_per_user {
            tracing::warn!(
                user_id = %user_id,
                active_sessions = existing.len(),
                max_sessions = self.config.max_sessions_per_user,
                "Session limit reached"
            );
            return Err(GatewayError::MaxSessions);
        }

        let now = self.clock.now();
        let session = Session {
            id: SessionId::generate(),
            user_id: user_id.clone(),
            created_at: now,
            expires_at: self.expiry_from(now)?,
            data: HashMap::new(),
        };

        self.store.create(&session).await?;
        metrics::counter!("safectx_sessions_created_total").increment(1);

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            expires_at = %session.expires_at,
            "Session created"
        );

        Ok(session)
    }

    /// Look up a live session.
    ///
    /// A session found at or after its expiry is deleted as a side effect.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No record exists → `GatewayError::NotFound`
    /// - The record is logically dead → `GatewayError::Expired`
    /// - The store fails → `GatewayError::Unavailable`
    pub async fn get_session(&self, id: &SessionId) -> Result<Session> {
        let session = self.store.get(id).await?;

        if session.is_expired_at(self.clock.now()) {
            self.reap(&session).await;
            return Err(GatewayError::Expired);
        }

        Ok(session)
    }

    /// Overwrite a stored session.
    ///
    /// Callers mutate `data` or `expires_at` before calling.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No record exists → `GatewayError::NotFound`
    /// - The owner or creation time differs from the stored record →
    ///   `GatewayError::InvalidInput`
    /// - The store fails → `GatewayError::Unavailable`
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        self.store.update(session).await?;
        tracing::debug!(session_id = %session.id, "Session updated");
        Ok(())
    }

    /// Slide a live session's expiry to `now + session_timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::get_session`] and
    /// [`SessionManager::update_session`].
    pub async fn refresh_session(&self, id: &SessionId) -> Result<Session> {
        let mut session = self.get_session(id).await?;
        session.expires_at = self.expiry_from(self.clock.now())?;
        self.update_session(&session).await?;

        tracing::debug!(
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Session refreshed"
        );

        Ok(session)
    }

    /// Delete a session and its index entry.
    ///
    /// Deleting an absent session succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.store.delete(id).await?;
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    /// List a user's live sessions, oldest first.
    ///
    /// Sessions found expired are reaped and left out.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn list_user_sessions(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let now = self.clock.now();
        let sessions = self.store.list_by_user_id(user_id).await?;

        let mut live = Vec::with_capacity(sessions.len());
        for session in sessions {
            if session.is_expired_at(now) {
                self.reap(&session).await;
            } else {
                live.push(session);
            }
        }

        Ok(live)
    }

    /// Delete an expired session. Failure is logged; the next read retries.
    async fn reap(&self, session: &Session) {
        match self.store.delete(&session.id).await {
            Ok(()) => {
                metrics::counter!("safectx_sessions_reaped_total").increment(1);
                tracing::debug!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    expired_at = %session.expires_at,
                    "Reaped expired session"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "Failed to reap expired session"
                );
            }
        }
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        chrono::Duration::from_std(self.config.session_timeout)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| GatewayError::InvalidInput("session timeout out of range".into()))
    }

    fn user_lock(&self, user_id: &UserId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .user_locks
            .lock()
            .map_err(|_| GatewayError::Internal("Mutex lock failed".to_string()))?;

        // Entries nobody else holds are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        Ok(Arc::clone(locks.entry(user_id.clone()).or_default()))
    }
}
