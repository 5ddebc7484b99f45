//! Redactor trait and the field-name redactor.

use safectx_core::McpRequest;
use serde_json::Value;

/// Replacement written over redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Redactor.
///
/// Has no failure mode and leaves unrecognised fields untouched.
pub trait Redactor: Send + Sync {
    /// Redact the request in place, returning the paths of the fields it
    /// replaced (e.g. `params.password`).
    fn apply(&self, request: &mut McpRequest) -> Vec<String>;
}

/// Replaces values of known-sensitive fields by name.
#[derive(Debug, Clone)]
pub struct FieldRedactor {
    param_fields: Vec<String>,
    context_fields: Vec<String>,
}

impl FieldRedactor {
    /// Create a redactor for the given `params` and `context` field names.
    #[must_use]
    pub fn new<P, C>(param_fields: P, context_fields: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            param_fields: param_fields.into_iter().map(Into::into).collect(),
            context_fields: context_fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FieldRedactor {
    fn default() -> Self {
        Self::new(
            ["password", "api_key", "ssn", "credit_card", "secret_key"],
            ["user_password"],
        )
    }
}

fn redact_fields(
    map: &mut serde_json::Map<String, Value>,
    fields: &[String],
    section: &str,
    redacted: &mut Vec<String>,
) {
    for field in fields {
        if let Some(value) = map.get_mut(field) {
            *value = Value::String(REDACTED.to_string());
            redacted.push(format!("{section}.{field}"));
        }
    }
}

impl Redactor for FieldRedactor {
    fn apply(&self, request: &mut McpRequest) -> Vec<String> {
        let mut redacted = Vec::new();
        redact_fields(&mut request.params, &self.param_fields, "params", &mut redacted);
        redact_fields(&mut request.context, &self.context_fields, "context", &mut redacted);
        redacted
    }
}
