//! Unified error taxonomy for the sync engine.
//!
//! Every public operation returns `Result<T, SyncError>`. Session-class
//! errors are produced once at the request orchestrator boundary; cart and
//! voucher operations add their own domain variants. `SyncError` is `Clone`
//! so a single in-flight refresh can hand the same outcome to every waiter.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the session, cart and voucher layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Credentials are gone or no longer accepted; the shopper must sign in again.
    #[error("Session expired")]
    SessionExpired,

    /// Authenticated, but not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The refresh operation itself failed. Handled like `SessionExpired`.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Items were rejected for stock reasons and removed from the cart.
    #[error("Out of stock: {}", .products.join(", "))]
    StockUnavailable {
        /// Titles (or parsed product names) of the affected items.
        products: Vec<String>,
        /// Server message that triggered the recovery.
        message: String,
    },

    /// Promo code rejected by the backend.
    #[error("Voucher invalid: {0}")]
    VoucherInvalid(String),

    /// Transport-level failure with no structured server error.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other server-reported error.
    #[error("Server error: {0}")]
    Domain(String),

    /// Persisting credentials or the cart snapshot failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Response payload did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl SyncError {
    /// Whether the UI should treat this as "signed out" and redirect to login.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::RefreshFailed(_))
    }

    /// Shopper-facing message. Internal details never leak for transport,
    /// storage or decode failures.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionExpired | Self::RefreshFailed(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::PermissionDenied(_) => "You don't have permission to do that.".to_string(),
            Self::StockUnavailable { products, .. } if products.is_empty() => {
                "Some items are no longer available.".to_string()
            }
            Self::StockUnavailable { products, .. } => format!(
                "Some items are no longer available and were removed from your cart: {}.",
                products.join(", ")
            ),
            Self::VoucherInvalid(message) if message.is_empty() => {
                "This promo code can't be applied to your cart.".to_string()
            }
            Self::VoucherInvalid(message) | Self::Domain(message) => message.clone(),
            Self::Network(_) => {
                "We couldn't reach the store. Check your connection and try again.".to_string()
            }
            Self::Storage(_) | Self::Decode(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
