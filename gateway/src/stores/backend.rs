//! Configuration-selected session store.

use super::{InMemorySessionStore, RedisSessionStore};
use crate::config::{SessionConfig, StoreConfig};
use crate::error::Result;
use crate::providers::SessionStore;
use crate::state::{Session, SessionId, UserId};

/// A session store chosen at construction time from [`StoreConfig`].
#[derive(Clone)]
pub enum SessionBackend {
    /// In-process map.
    Memory(InMemorySessionStore),
    /// Redis-compatible networked store.
    Redis(RedisSessionStore),
}

impl SessionBackend {
    /// Build the store named by `config.store`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidInput` if the configuration is invalid,
    /// or `GatewayError::Unavailable` if Redis cannot be reached.
    pub async fn from_config(config: &SessionConfig) -> Result<Self> {
        config.validate()?;

        match &config.store {
            StoreConfig::Memory => {
                tracing::info!("Using in-memory session store");
                Ok(Self::Memory(InMemorySessionStore::new()))
            }
            StoreConfig::Redis { url, namespace } => {
                tracing::info!(namespace = %namespace, "Using Redis session store");
                Ok(Self::Redis(RedisSessionStore::new(url, namespace.clone()).await?))
            }
        }
    }

    /// Short name of the active backend, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

impl SessionStore for SessionBackend {
    async fn get(&self, id: &SessionId) -> Result<Session> {
        match self {
            Self::Memory(store) => store.get(id).await,
            Self::Redis(store) => store.get(id).await,
        }
    }

    async fn create(&self, session: &Session) -> Result<()> {
        match self {
            Self::Memory(store) => store.create(session).await,
            Self::Redis(store) => store.create(session).await,
        }
    }

    async fn update(&self, session: &Session) -> Result<()> {
        match self {
            Self::Memory(store) => store.update(session).await,
            Self::Redis(store) => store.update(session).await,
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        match self {
            Self::Memory(store) => store.delete(id).await,
            Self::Redis(store) => store.delete(id).await,
        }
    }

    async fn list_by_user_id(&self, user_id: &UserId) -> Result<Vec<Session>> {
        match self {
            Self::Memory(store) => store.list_by_user_id(user_id).await,
            Self::Redis(store) => store.list_by_user_id(user_id).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_backend_from_default_config() {
        let backend = SessionBackend::from_config(&SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(backend.kind(), "memory");

        let session = Session::new(
            SessionId::generate(),
            "alice".into(),
            chrono::Utc::now(),
            chrono::Duration::hours(1),
        );
        backend.create(&session).await.unwrap();
        assert_eq!(backend.get(&session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let config = SessionConfig::default().with_session_timeout(Duration::ZERO);
        let result = SessionBackend::from_config(&config).await;
        assert!(matches!(result, Err(GatewayError::InvalidInput(_))));
    }
}
