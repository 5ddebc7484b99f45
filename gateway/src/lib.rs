//! # SafeCtx Gateway
//!
//! Request admission for a backend that executes tool and context calls on
//! behalf of authenticated users. Decides, per inbound request, whether it
//! may proceed, under what identity and with what session continuity, before
//! any business logic runs.
//!
//! ## Features
//!
//! - **Admission pipeline**: a fixed, short-circuiting chain of tower layers
//!   (recovery, logging, rate limit, authentication, validation, content
//!   detection, policy, redaction)
//! - **Rate limiting**: shared token bucket plus a per-source ceiling
//! - **Session lifecycle**: creation, lookup with read-triggered expiry,
//!   refresh, deletion and a per-user maximum
//! - **Pluggable stores**: in-memory or Redis, chosen by configuration
//! - **Testable**: injected clock and mock collaborators
//!
//! ## Architecture
//!
//! ```text
//! RawRequest → Pipeline stages → terminal handler
//!                                     │
//!                                     ▼
//!                              SessionManager → SessionStore (memory | Redis)
//! ```
//!
//! ## Example: Session Lifecycle
//!
//! ```
//! use safectx_gateway::config::SessionConfig;
//! use safectx_gateway::manager::SessionManager;
//! use safectx_gateway::stores::InMemorySessionStore;
//! use safectx_gateway::GatewayError;
//!
//! # tokio_test::block_on(async {
//! let manager = SessionManager::new(InMemorySessionStore::new(), SessionConfig::default());
//!
//! let session = manager.create_session(&"alice".into()).await?;
//! manager.delete_session(&session.id).await?;
//!
//! assert_eq!(manager.get_session(&session.id).await, Err(GatewayError::NotFound));
//! # Ok::<_, GatewayError>(())
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Public modules
pub mod config;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod providers;
pub mod rate_limiter;
pub mod state;
pub mod stores;

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::{GatewayConfig, RateLimitConfig, SessionConfig, StoreConfig};
pub use error::{GatewayError, Result};
pub use manager::SessionManager;
pub use pipeline::{GatewayResponse, Pipeline, PipelineBuilder, RawRequest, RequestMetadata};
pub use rate_limiter::RateLimiter;
pub use state::{AuthMethod, Principal, Session, SessionId, UserId};
pub use stores::SessionBackend;
