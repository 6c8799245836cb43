//! Integration tests for the storefront sync engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storefront-sync-integration-tests
//! ```
//!
//! No network or backend is needed: every test drives the engine through
//! [`ScriptedTransport`], which answers each GraphQL operation from a
//! per-operation handler and records every call it receives.
//!
//! # Test Categories
//!
//! - `session_refresh` - single-flight refresh, retry cap, credential clearing
//! - `cart_store` - line rules, remote checkout, stock recovery, clear
//! - `hydration` - startup reconciliation and persistence
//! - `voucher` - promo code validation and idempotence

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use storefront_sync::storage::{KeyValueStore, MemoryStore, keys};
use storefront_sync::{GraphQLRequest, GraphQLResponse, Result, SyncError, Transport};

type Handler = Box<dyn Fn(&RecordedCall) -> Result<GraphQLResponse> + Send + Sync>;

/// A request as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub variables: Value,
    /// Bearer token attached to the request, if any.
    pub bearer: Option<String>,
}

/// In-process [`Transport`] double.
///
/// Cloning shares the script and the call log, so a test can keep one
/// handle while the engine owns another.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<RecordedCall>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `operation` with `handler`. Replaces any previous handler.
    #[must_use]
    pub fn on(
        self,
        operation: &str,
        handler: impl Fn(&RecordedCall) -> Result<GraphQLResponse> + Send + Sync + 'static,
    ) -> Self {
        self.inner
            .handlers
            .lock()
            .insert(operation.to_string(), Box::new(handler));
        self
    }

    /// Answer `operation` with the same response every time.
    #[must_use]
    pub fn respond(self, operation: &str, response: GraphQLResponse) -> Self {
        self.on(operation, move |_| Ok(response.clone()))
    }

    /// Fail `operation` with a transport error every time.
    #[must_use]
    pub fn fail(self, operation: &str) -> Self {
        let message = format!("connection refused ({operation})");
        self.on(operation, move |_| Err(SyncError::Network(message.clone())))
    }

    /// Hold every `operation` call for `delay` before answering.
    #[must_use]
    pub fn delay(self, operation: &str, delay: Duration) -> Self {
        self.inner
            .delays
            .lock()
            .insert(operation.to_string(), delay);
        self
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// Number of calls received for `operation`.
    #[must_use]
    pub fn calls_to(&self, operation: &str) -> usize {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Most recent call for `operation`.
    #[must_use]
    pub fn last_call_to(&self, operation: &str) -> Option<RecordedCall> {
        self.inner
            .calls
            .lock()
            .iter()
            .rev()
            .find(|c| c.operation == operation)
            .cloned()
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &GraphQLRequest,
        token: Option<&SecretString>,
    ) -> Result<GraphQLResponse> {
        let call = RecordedCall {
            operation: request.operation_name.to_string(),
            variables: request.variables.clone(),
            bearer: token.map(|t| t.expose_secret().to_string()),
        };
        self.inner.calls.lock().push(call.clone());

        let delay = self.inner.delays.lock().get(&call.operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let handlers = self.inner.handlers.lock();
        handlers.get(&call.operation).map_or_else(
            || {
                Err(SyncError::Network(format!(
                    "no script for {}",
                    call.operation
                )))
            },
            |handler| handler(&call),
        )
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Operation names as sent on the wire.
pub mod ops {
    pub const TOKEN_CREATE: &str = "TokenCreate";
    pub const TOKEN_REFRESH: &str = "TokenRefresh";
    pub const CHECKOUT_CREATE: &str = "CheckoutCreate";
    pub const CHECKOUT: &str = "Checkout";
    pub const VOUCHER_VALIDATE: &str = "VoucherValidate";
}

/// A store holding an access token, refresh token and user id.
#[must_use]
pub fn signed_in_store(token: &str, refresh_token: &str) -> Arc<MemoryStore> {
    let store = MemoryStore::shared();
    let seeded = store
        .set_item(keys::TOKEN, token)
        .and_then(|()| store.set_item(keys::REFRESH_TOKEN, refresh_token))
        .and_then(|()| store.set_item(keys::USER_ID, "VXNlcjox"));
    assert!(seeded.is_ok(), "memory store writes cannot fail");
    store
}

/// An unsigned JWT whose `exp` claim lies `seconds` from now.
#[must_use]
pub fn jwt_expiring_in(seconds: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + seconds;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{header}.{claims}.signature")
}

/// The error servers send for an expired JWT.
#[must_use]
pub fn expired() -> GraphQLResponse {
    GraphQLResponse::error("Signature has expired")
}

/// A successful token refresh yielding `token`.
#[must_use]
pub fn refreshed(token: &str) -> GraphQLResponse {
    GraphQLResponse::data(serde_json::json!({
        "tokenRefresh": { "token": token, "errors": [] }
    }))
}

/// A `Checkout` query answer for `id`.
#[must_use]
pub fn checkout_found(id: &str) -> GraphQLResponse {
    GraphQLResponse::data(serde_json::json!({
        "checkout": { "id": id, "token": format!("{id}-token") }
    }))
}

/// A `CheckoutCreate` answer for `id`.
#[must_use]
pub fn checkout_created(id: &str) -> GraphQLResponse {
    GraphQLResponse::data(serde_json::json!({
        "checkoutCreate": {
            "checkout": { "id": id, "token": format!("{id}-token") },
            "errors": []
        }
    }))
}

/// A `VoucherValidate` answer granting `amount`.
#[must_use]
pub fn voucher_valid(code: &str, amount: &str) -> GraphQLResponse {
    GraphQLResponse::data(serde_json::json!({
        "voucherValidate": {
            "voucher": { "code": code, "discountAmount": amount },
            "errors": []
        }
    }))
}
