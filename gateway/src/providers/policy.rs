//! Policy engine trait and built-in engines.

use crate::error::Result;
use safectx_core::McpRequest;
use std::collections::HashSet;

/// Policy engine.
///
/// `Ok(false)` and `Err(_)` both deny the request. The pipeline answers the
/// caller identically in both cases but logs them as distinct events.
pub trait PolicyEngine: Send + Sync {
    /// Decide whether the decoded request may proceed.
    ///
    /// # Errors
    ///
    /// Returns error if the decision could not be made.
    fn evaluate(&self, request: &McpRequest) -> Result<bool>;
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicyEngine;

impl PolicyEngine for DefaultPolicyEngine {
    fn evaluate(&self, _request: &McpRequest) -> Result<bool> {
        Ok(true)
    }
}

/// Allows only requests whose method is on a fixed list.
#[derive(Debug, Clone, Default)]
pub struct AllowListPolicy {
    methods: HashSet<String>,
}

impl AllowListPolicy {
    /// Create a policy allowing the given methods.
    #[must_use]
    pub fn new<I, M>(methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }
}

impl PolicyEngine for AllowListPolicy {
    fn evaluate(&self, request: &McpRequest) -> Result<bool> {
        Ok(self.methods.contains(request.method.trim()))
    }
}
