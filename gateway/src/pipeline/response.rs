//! Terminal responses produced by the pipeline.

use crate::error::GatewayError;
use http::StatusCode;
use serde_json::{Value, json};

/// A response produced either by a stage that short-circuited or by the
/// terminal handler.
///
/// Error bodies have the shape `{"code": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// HTTP-class status.
    pub status: StatusCode,
    /// JSON body.
    pub body: Value,
}

impl GatewayResponse {
    /// A 200 response carrying `body`.
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// An error response.
    #[must_use]
    pub fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "code": code, "message": message.into() }),
        }
    }

    /// 429 Too Many Requests.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self::error(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", "Rate limit exceeded")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Authentication required")
    }

    /// 400 Bad Request for an undecodable body.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    /// 400 Bad Request for a body missing required fields.
    #[must_use]
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, "SCHEMA_VALIDATION_FAILED", message)
    }

    /// 403 Forbidden for disallowed content.
    #[must_use]
    pub fn content_policy() -> Self {
        Self::error(
            StatusCode::FORBIDDEN,
            "CONTENT_POLICY",
            "Request blocked by content policy",
        )
    }

    /// 403 Forbidden for a policy denial.
    #[must_use]
    pub fn policy_denied() -> Self {
        Self::error(StatusCode::FORBIDDEN, "POLICY_DENIED", "Request denied by policy")
    }

    /// 500 with a fixed message.
    #[must_use]
    pub fn internal() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }

    /// 504 for a request whose deadline elapsed.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::error(StatusCode::GATEWAY_TIMEOUT, "CANCELLED", "Request deadline exceeded")
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `code` field of an error body.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

impl From<GatewayError> for GatewayResponse {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => {
                Self::error(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            GatewayError::Expired => {
                Self::error(StatusCode::UNAUTHORIZED, "SESSION_EXPIRED", err.to_string())
            }
            GatewayError::MaxSessions => {
                Self::error(StatusCode::CONFLICT, "MAX_SESSIONS", err.to_string())
            }
            GatewayError::Conflict(_) => {
                Self::error(StatusCode::CONFLICT, "CONFLICT", err.to_string())
            }
            GatewayError::Denied { .. } => {
                Self::error(StatusCode::FORBIDDEN, "DENIED", err.to_string())
            }
            GatewayError::InvalidInput(_) => {
                Self::error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.to_string())
            }
            GatewayError::Unavailable(_) => Self::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "Service temporarily unavailable",
            ),
            GatewayError::Cancelled => Self::cancelled(),
            GatewayError::Internal(_) => Self::internal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let response = GatewayResponse::policy_denied();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.code(), Some("POLICY_DENIED"));
        assert!(response.body.get("message").is_some());
        assert!(!response.is_success());
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let response = GatewayResponse::from(GatewayError::Internal("db password=x".into()));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.body.to_string().contains("password"));

        let response = GatewayResponse::from(GatewayError::Unavailable("10.1.2.3 refused".into()));
        assert!(!response.body.to_string().contains("10.1.2.3"));
    }

    #[test]
    fn test_session_errors_map_to_distinct_codes() {
        assert_eq!(
            GatewayResponse::from(GatewayError::NotFound).code(),
            Some("NOT_FOUND")
        );
        assert_eq!(
            GatewayResponse::from(GatewayError::Expired).code(),
            Some("SESSION_EXPIRED")
        );
        assert_eq!(
            GatewayResponse::from(GatewayError::MaxSessions).status,
            StatusCode::CONFLICT
        );
    }
}
