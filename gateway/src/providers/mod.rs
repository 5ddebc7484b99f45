//! Collaborator interfaces.
//!
//! This module defines traits for everything the session manager and the
//! admission pipeline depend on but do not implement themselves. These traits
//! enable dependency injection and make the admission logic testable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────────────┐
//! │ Pipeline stages  │──────▶ │ Authenticator (async)    │
//! │                  │──────▶ │ PolicyEngine             │
//! │                  │──────▶ │ Detector                 │
//! │                  │──────▶ │ Redactor                 │
//! └──────────────────┘        └──────────────────────────┘
//! ┌──────────────────┐        ┌──────────────────────────┐
//! │ SessionManager   │──────▶ │ SessionStore (async)     │
//! └──────────────────┘        └──────────────────────────┘
//! ```
//!
//! - **Testing**: use the mocks in `crate::mocks`
//! - **Production**: use the built-in adapters or bring your own

pub mod authenticator;
pub mod detector;
pub mod policy;
pub mod redactor;
pub mod session;

pub use authenticator::{
    Authenticator, SESSION_ID_HEADER, SessionAuthenticator, StaticTokenAuthenticator, bearer_token,
};
pub use detector::{DEFAULT_BLOCKED_PATTERNS, Detector, PatternDetector};
pub use policy::{AllowListPolicy, DefaultPolicyEngine, PolicyEngine};
pub use redactor::{FieldRedactor, REDACTED, Redactor};
pub use session::SessionStore;
