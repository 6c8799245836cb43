//! Remote API boundary.
//!
//! A single GraphQL endpoint receives an operation document plus variables
//! and answers `{ data?, errors?: [{ message, extensions? }] }`. The
//! [`Transport`] trait performs one exchange and owns no state; everything
//! above it (refresh, retry, classification) lives in the session layer.

mod transport;

pub mod operations;

use std::future::Future;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use operations::Operation;
pub use transport::HttpTransport;

use crate::error::Result;

/// Performs a single request/response exchange.
///
/// Implementations must not retry or refresh; a `Network` error means no
/// GraphQL body could be obtained.
pub trait Transport: Send + Sync + 'static {
    /// Send `request`, attaching `token` as a bearer credential when present.
    fn send(
        &self,
        request: &GraphQLRequest,
        token: Option<&SecretString>,
    ) -> impl Future<Output = Result<GraphQLResponse>> + Send;
}

/// GraphQL request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: &'static str,
    pub operation_name: &'static str,
    pub variables: Value,
}

impl GraphQLRequest {
    #[must_use]
    pub const fn new(operation: &Operation, variables: Value) -> Self {
        Self {
            query: operation.document,
            operation_name: operation.name,
            variables,
        }
    }
}

/// GraphQL response envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    /// A successful response carrying `data`.
    #[must_use]
    pub const fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// A failed response with a single error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::from_errors(vec![GraphQLError::new(message)])
    }

    /// A failed response with a single coded error.
    #[must_use]
    pub fn error_with_code(message: impl Into<String>, code: &str) -> Self {
        Self::from_errors(vec![GraphQLError::with_code(message, code)])
    }

    #[must_use]
    pub const fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// First error, if any. Classification only ever looks at this one.
    #[must_use]
    pub fn first_error(&self) -> Option<&GraphQLError> {
        self.errors.as_deref().and_then(<[GraphQLError]>::first)
    }
}

/// A GraphQL error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }

    /// Error carrying `extensions.exception.code`.
    #[must_use]
    pub fn with_code(message: impl Into<String>, code: &str) -> Self {
        Self {
            message: message.into(),
            extensions: Some(serde_json::json!({ "exception": { "code": code } })),
        }
    }

    /// Structured error code: `extensions.exception.code`, then `extensions.code`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        let extensions = self.extensions.as_ref()?;
        extensions
            .pointer("/exception/code")
            .and_then(Value::as_str)
            .or_else(|| extensions.get("code").and_then(Value::as_str))
    }
}

/// Join error messages for display, matching the order the server sent them.
pub(crate) fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .map(|e| e.message.as_str())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
