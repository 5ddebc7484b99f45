//! Request schema.
//!
//! `McpRequest` is the JSON-RPC / MCP-compatible body carried by every request
//! that reaches the admission pipeline: an LLM tool call or context evaluation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Structural validation failures for [`McpRequest`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// `id` or `method` is missing or empty.
    #[error("missing required fields: id or method")]
    MissingFields,
}

/// A decoded tool/context call.
///
/// `params` and `context` default to empty maps when absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpRequest {
    /// Caller-chosen request identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    /// Method (tool) name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,

    /// Call parameters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Map<String, Value>,

    /// Ambient context attached by the caller.
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl McpRequest {
    /// Create a request with empty params and context.
    #[must_use]
    pub fn new(id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: Map::new(),
            context: Map::new(),
        }
    }

    /// Set a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The `prompt` parameter, when present and a string.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.params.get("prompt").and_then(Value::as_str)
    }

    /// Check that the request has the fields every downstream stage relies on.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingFields`] if `id` or `method` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use safectx_core::schema::{McpRequest, SchemaError};
    ///
    /// assert!(McpRequest::new("1", "tools/call").validate().is_ok());
    /// assert_eq!(McpRequest::new("", "tools/call").validate(), Err(SchemaError::MissingFields));
    /// ```
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id.trim().is_empty() || self.method.trim().is_empty() {
            return Err(SchemaError::MissingFields);
        }
        Ok(())
    }
}
