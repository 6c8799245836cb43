//! Classify server errors as session-expired, permission-denied or domain.
//!
//! Structured codes are checked first. Message substrings remain as a
//! fallback for servers that only send text.

use crate::api::GraphQLError;

/// How a server error should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credentials expired or invalid; refresh and retry once.
    SessionExpired,
    /// Authenticated but forbidden; surface without refresh.
    PermissionDenied,
    /// Anything else.
    Domain,
}

const EXPIRED_CODES: &[&str] = &[
    "ExpiredSignatureError",
    "JSONWebTokenExpired",
    "JSONWebTokenError",
    "UNAUTHENTICATED",
];

const PERMISSION_CODES: &[&str] = &["PermissionDenied", "PERMISSION_DENIED", "FORBIDDEN"];

const EXPIRED_MESSAGES: &[&str] = &[
    "signature has expired",
    "token has expired",
    "jwt expired",
    "expired token",
    "invalid token",
];

const PERMISSION_MESSAGES: &[&str] = &[
    "you do not have permission",
    "you need one of the following permissions",
    "permission denied",
];

/// Classify a single error entry.
#[must_use]
pub fn classify(error: &GraphQLError) -> ErrorClass {
    if let Some(code) = error.code() {
        if EXPIRED_CODES.contains(&code) {
            return ErrorClass::SessionExpired;
        }
        if PERMISSION_CODES.contains(&code) {
            return ErrorClass::PermissionDenied;
        }
    }

    let message = error.message.to_lowercase();
    if EXPIRED_MESSAGES.iter().any(|needle| message.contains(needle)) {
        ErrorClass::SessionExpired
    } else if PERMISSION_MESSAGES.iter().any(|needle| message.contains(needle)) {
        ErrorClass::PermissionDenied
    } else {
        ErrorClass::Domain
    }
}
