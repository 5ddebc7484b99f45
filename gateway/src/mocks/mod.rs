//! Mock implementations for testing.
//!
//! This module provides simple, in-memory implementations of every
//! collaborator trait and two instrumented session stores, for use in unit
//! and integration tests.

pub mod collaborators;
pub mod session;

pub use collaborators::{MockAuthenticator, MockDetector, MockPolicyEngine, MockRedactor};
pub use session::{FailingSessionStore, RecordingSessionStore};
