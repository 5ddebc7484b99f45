//! # SafeCtx Core
//!
//! Shared primitives for the SafeCtx admission gateway.
//!
//! This crate provides:
//! - [`environment`]: the `Clock` abstraction, so session expiry can be tested
//!   at memory speed with a controllable clock
//! - [`schema`]: the decoded request envelope (`McpRequest`) that flows through
//!   the admission pipeline, and its structural validation
//!
//! ## Example
//!
//! ```
//! use safectx_core::schema::McpRequest;
//!
//! let request: McpRequest = serde_json::from_str(
//!     r#"{"id": "1", "method": "tools/call", "params": {"prompt": "hello"}}"#,
//! ).unwrap();
//!
//! assert!(request.validate().is_ok());
//! assert!(request.context.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod schema;

pub use environment::{Clock, SystemClock};
pub use schema::{McpRequest, SchemaError};
