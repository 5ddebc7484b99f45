//! Redis-based session store implementation.
//!
//! This module provides a networked session store using Redis with TTL-based
//! expiration.
//!
//! # Architecture
//!
//! Sessions are stored in Redis with:
//! - **Primary key**: `{namespace}:session:{session_id}` → JSON-serialized Session
//! - **User index**: `{namespace}:user:{user_id}:sessions` (Set) → session IDs
//! - **TTL**: remaining lifetime at write time, so an untouched session
//!   disappears on its own even if nobody reads it again
//! - **Index TTL**: the longest member's lifetime plus a day, pushed out on
//!   every create and update (needs Redis 7 for `PEXPIRE NX|GT`)
//!
//! # Example
//!
//! ```no_run
//! use safectx_gateway::stores::RedisSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379", "safectx").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{GatewayError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// How long a user index outlives the session that last touched it.
const INDEX_TTL_BUFFER_MS: u64 = 24 * 60 * 60 * 1000;

/// Redis-based session store with TTL-based expiration.
///
/// Provides:
/// - Session storage with store-side expiry
/// - Per-user session index as a Redis set
/// - Self-healing index on list
/// - Connection pooling via `ConnectionManager`
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,

    /// Prefix for every key this store writes.
    namespace: String,
}

impl RedisSessionStore {
    /// Create a new Redis session store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `namespace` - Key prefix (e.g., "safectx")
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if connection to Redis fails.
    pub async fn new(redis_url: &str, namespace: impl Into<String>) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            GatewayError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            GatewayError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            conn_manager,
            namespace: namespace.into(),
        })
    }

    /// Get the Redis key for a session.
    fn session_key(&self, session_id: &SessionId) -> String {
        format!("{}:session:{}", self.namespace, session_id.0)
    }

    /// Get the Redis key for user sessions set.
    fn user_sessions_key(&self, user_id: &UserId) -> String {
        format!("{}:user:{}:sessions", self.namespace, user_id.0)
    }

    /// Remaining lifetime in milliseconds, never below 1 (Redis rejects 0).
    fn ttl_millis(session: &Session) -> u64 {
        let remaining = session.remaining_ttl(Utc::now()).num_milliseconds();
        u64::try_from(remaining).unwrap_or(0).max(1)
    }

    fn index_ttl_millis(session: &Session) -> u64 {
        Self::ttl_millis(session).saturating_add(INDEX_TTL_BUFFER_MS)
    }

    /// Queue commands that lengthen the index expiry to `ttl_ms`, never shorten it.
    fn extend_index_ttl(pipe: &mut redis::Pipeline, key: &str, ttl_ms: u64) {
        // NX sets it on a fresh set; GT only moves an existing one later.
        pipe.cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_ms)
            .arg("NX")
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_ms)
            .arg("GT")
            .ignore();
    }

    fn encode(session: &Session) -> Result<Vec<u8>> {
        serde_json::to_vec(session)
            .map_err(|e| GatewayError::Internal(format!("Failed to encode session: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Session> {
        serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Internal(format!("Failed to decode session: {e}")))
    }
}

impl SessionStore for RedisSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Session> {
        let mut conn = self.conn_manager.clone();
        let session_key = self.session_key(id);

        let session_bytes: Option<Vec<u8>> = conn.get(&session_key).await?;

        match session_bytes {
            Some(bytes) => Self::decode(&bytes),
            None => Err(GatewayError::NotFound),
        }
    }

    async fn create(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = self.session_key(&session.id);
        let user_sessions_key = self.user_sessions_key(&session.user_id);

        let exists: bool = conn.exists(&session_key).await?;
        if exists {
            return Err(GatewayError::Conflict("Session ID already exists".to_string()));
        }

        let payload = Self::encode(session)?;
        let ttl_ms = Self::ttl_millis(session);

        // Record, index entry and index expiry land in one MULTI/EXEC.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .pset_ex(&session_key, payload, ttl_ms)
            .ignore()
            .sadd(&user_sessions_key, session.id.as_str())
            .ignore();
        Self::extend_index_ttl(&mut pipe, &user_sessions_key, Self::index_ttl_millis(session));
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::debug!(
            session_id = %session.id,
            user_id = %session.user_id,
            ttl_ms = ttl_ms,
            "Created session in Redis"
        );

        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let existing = self.get(&session.id).await?;
        super::check_immutable_fields(&existing, session)?;

        let mut conn = self.conn_manager.clone();
        let session_key = self.session_key(&session.id);
        let payload = Self::encode(session)?;
        let ttl_ms = Self::ttl_millis(session);

        // XX: a record deleted since the read above stays deleted.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&session_key)
            .arg(payload)
            .arg("XX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        if reply.is_none() {
            return Err(GatewayError::NotFound);
        }

        let user_sessions_key = self.user_sessions_key(&session.user_id);
        let mut pipe = redis::pipe();
        Self::extend_index_ttl(&mut pipe, &user_sessions_key, Self::index_ttl_millis(session));
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::debug!(
            session_id = %session.id,
            ttl_ms = ttl_ms,
            "Updated session with refreshed TTL"
        );

        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let session = match self.get(id).await {
            Ok(session) => session,
            Err(GatewayError::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut conn = self.conn_manager.clone();
        let session_key = self.session_key(id);
        let user_sessions_key = self.user_sessions_key(&session.user_id);

        let _: () = redis::pipe()
            .atomic()
            .del(&session_key)
            .ignore()
            .srem(&user_sessions_key, id.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(session_id = %id, "Deleted session from Redis");

        Ok(())
    }

    async fn list_by_user_id(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let mut conn = self.conn_manager.clone();
        let user_sessions_key = self.user_sessions_key(user_id);

        let session_ids: Vec<String> = conn.smembers(&user_sessions_key).await?;

        let mut sessions = Vec::with_capacity(session_ids.len());
        let mut dead_session_count = 0_usize;

        for id_str in session_ids {
            match self.get(&SessionId(id_str.clone())).await {
                Ok(session) => sessions.push(session),
                Err(GatewayError::NotFound) => {
                    // Record evicted or never written: repair the index.
                    let removed: redis::RedisResult<i64> =
                        conn.srem(&user_sessions_key, &id_str).await;
                    if let Err(e) = removed {
                        tracing::warn!(
                            user_id = %user_id,
                            session_id = %id_str,
                            error = %e,
                            "Failed to clean up dead session reference"
                        );
                    }
                    dead_session_count += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if dead_session_count > 0 {
            tracing::debug!(
                user_id = %user_id,
                dead_count = dead_session_count,
                valid_count = sessions.len(),
                "Cleaned up dead session references"
            );
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }
}
