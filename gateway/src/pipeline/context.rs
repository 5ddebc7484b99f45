//! Request envelope threaded through the admission stages.

use crate::state::Principal;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use safectx_core::McpRequest;
use tokio::time::Instant;
use uuid::Uuid;

/// Transport-level facts about an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// Client source identifier (typically the remote address).
    pub source: String,

    /// Route or endpoint the request arrived on.
    pub route: String,

    /// Request headers.
    pub headers: HeaderMap,

    /// Point after which nobody is waiting for the response.
    pub deadline: Option<Instant>,
}

impl RequestMetadata {
    /// Metadata for a request from `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Set route.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Add a header. Names or values that are not valid header text are
    /// dropped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Header value as text, if present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An undecoded inbound request.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Transport metadata.
    pub metadata: RequestMetadata,

    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Create a raw request.
    #[must_use]
    pub fn new(metadata: RequestMetadata, body: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }

    /// Create a raw request whose body is the JSON encoding of `body`.
    #[must_use]
    pub fn json(metadata: RequestMetadata, body: &serde_json::Value) -> Self {
        Self::new(metadata, body.to_string())
    }
}

/// Per-request context.
///
/// Built once from a [`RawRequest`]; each stage that learns something hands
/// the next stage a context with one more field filled in. Nothing here
/// outlives the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    metadata: RequestMetadata,
    body: Vec<u8>,
    principal: Option<Principal>,
    request: Option<McpRequest>,
    redacted_fields: Vec<String>,
}

impl RequestContext {
    /// Wrap a raw request, assigning a fresh request ID.
    #[must_use]
    pub fn new(raw: RawRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            metadata: raw.metadata,
            body: raw.body,
            principal: None,
            request: None,
            redacted_fields: Vec::new(),
        }
    }

    /// Unique ID of this request.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Transport metadata.
    #[must_use]
    pub const fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// Raw body bytes.
    ///
    /// Empty once the validation stage has decoded the body; from then on
    /// only the decoded (and later redacted) request is visible.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Authenticated principal, once the authentication stage has run.
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Decoded request, once the validation stage has run.
    #[must_use]
    pub const fn request(&self) -> Option<&McpRequest> {
        self.request.as_ref()
    }

    /// Fields replaced by the redaction stage.
    #[must_use]
    pub fn redacted_fields(&self) -> &[String] {
        &self.redacted_fields
    }

    /// Attach the authenticated principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Attach the decoded request and drop the raw body it came from.
    #[must_use]
    pub fn with_request(mut self, request: McpRequest) -> Self {
        self.request = Some(request);
        self.body = Vec::new();
        self
    }

    /// Replace the decoded request with its redacted form.
    #[must_use]
    pub fn with_redacted(mut self, request: McpRequest, fields: Vec<String>) -> Self {
        self.request = Some(request);
        self.redacted_fields.extend(fields);
        self
    }

    /// Take the decoded request out, leaving the context without one.
    pub fn take_request(&mut self) -> Option<McpRequest> {
        self.request.take()
    }
}
