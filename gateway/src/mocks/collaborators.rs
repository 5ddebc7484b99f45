//! Mock pipeline collaborators.
//!
//! Each mock counts how often it was consulted, so tests can assert that a
//! short-circuiting stage kept every later stage from seeing the request.
//! Clones share their counter.

use crate::error::{GatewayError, Result};
use crate::pipeline::RequestMetadata;
use crate::providers::{Authenticator, Detector, PolicyEngine, Redactor};
use crate::state::{AuthMethod, Principal};
use safectx_core::McpRequest;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Default)]
struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mock authenticator.
#[derive(Debug, Clone)]
pub struct MockAuthenticator {
    principal: Option<Principal>,
    calls: CallCounter,
}

impl MockAuthenticator {
    /// Authenticate every request as `principal`.
    #[must_use]
    pub fn allowing(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            calls: CallCounter::default(),
        }
    }

    /// Authenticate every request as a JWT user called `user_id`.
    #[must_use]
    pub fn allowing_user(user_id: &str) -> Self {
        Self::allowing(Principal::new(user_id, AuthMethod::Jwt))
    }

    /// Reject every request.
    #[must_use]
    pub fn denying() -> Self {
        Self {
            principal: None,
            calls: CallCounter::default(),
        }
    }

    /// Number of `authenticate` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Authenticator for MockAuthenticator {
    async fn authenticate(&self, _metadata: &RequestMetadata) -> Result<Principal> {
        self.calls.hit();
        self.principal
            .clone()
            .ok_or_else(|| GatewayError::denied("mock authenticator rejects everything"))
    }
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Allow,
    Deny,
    Fail,
}

/// Mock policy engine.
#[derive(Debug, Clone)]
pub struct MockPolicyEngine {
    decision: Decision,
    calls: CallCounter,
}

impl MockPolicyEngine {
    fn with(decision: Decision) -> Self {
        Self {
            decision,
            calls: CallCounter::default(),
        }
    }

    /// Allow everything.
    #[must_use]
    pub fn allowing() -> Self {
        Self::with(Decision::Allow)
    }

    /// Deny everything with `Ok(false)`.
    #[must_use]
    pub fn denying() -> Self {
        Self::with(Decision::Deny)
    }

    /// Fail every evaluation with an error.
    #[must_use]
    pub fn failing() -> Self {
        Self::with(Decision::Fail)
    }

    /// Number of `evaluate` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PolicyEngine for MockPolicyEngine {
    fn evaluate(&self, _request: &McpRequest) -> Result<bool> {
        self.calls.hit();
        match self.decision {
            Decision::Allow => Ok(true),
            Decision::Deny => Ok(false),
            Decision::Fail => Err(GatewayError::Unavailable("policy backend down".into())),
        }
    }
}

/// Mock content detector.
#[derive(Debug, Clone)]
pub struct MockDetector {
    violation: bool,
    calls: CallCounter,
}

impl MockDetector {
    /// Never flag anything.
    #[must_use]
    pub fn clean() -> Self {
        Self {
            violation: false,
            calls: CallCounter::default(),
        }
    }

    /// Flag every request.
    #[must_use]
    pub fn flagging() -> Self {
        Self {
            violation: true,
            calls: CallCounter::default(),
        }
    }

    /// Number of `has_violation` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Detector for MockDetector {
    fn has_violation(&self, _request: &McpRequest) -> bool {
        self.calls.hit();
        self.violation
    }
}

/// Mock redactor that leaves requests untouched.
#[derive(Debug, Clone, Default)]
pub struct MockRedactor {
    calls: CallCounter,
}

impl MockRedactor {
    /// Create a pass-through redactor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `apply` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Redactor for MockRedactor {
    fn apply(&self, _request: &mut McpRequest) -> Vec<String> {
        self.calls.hit();
        Vec::new()
    }
}
