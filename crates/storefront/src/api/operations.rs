//! GraphQL operation documents and the response shapes the engine reads.
//!
//! Documents are opaque to the engine; only the selections listed in the
//! payload types below are relied on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_sync_core::{CheckoutId, UserId, VariantId};

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub document: &'static str,
}

// =============================================================================
// Authentication
// =============================================================================

/// Exchange email and password for a token pair.
pub const TOKEN_CREATE: Operation = Operation {
    name: "TokenCreate",
    document: r"mutation TokenCreate($email: String!, $password: String!) {
  tokenCreate(email: $email, password: $password) {
    token
    refreshToken
    user { id }
    errors { field message code }
  }
}",
};

/// Exchange a refresh token for a new access token.
pub const TOKEN_REFRESH: Operation = Operation {
    name: "TokenRefresh",
    document: r"mutation TokenRefresh($refreshToken: String!) {
  tokenRefresh(refreshToken: $refreshToken) {
    token
    errors { field message code }
  }
}",
};

// =============================================================================
// Checkout
// =============================================================================

/// Materialise a server-side checkout from local lines.
pub const CHECKOUT_CREATE: Operation = Operation {
    name: "CheckoutCreate",
    document: r"mutation CheckoutCreate($channel: String!, $lines: [CheckoutLineInput!]!) {
  checkoutCreate(input: { channel: $channel, lines: $lines }) {
    checkout { id token }
    errors { field message code variants }
  }
}",
};

/// Fetch a checkout by id. Returns `null` when it no longer exists.
pub const CHECKOUT: Operation = Operation {
    name: "Checkout",
    document: r"query Checkout($id: ID!) {
  checkout(id: $id) { id token }
}",
};

/// Validate a promo code against the current lines.
pub const VOUCHER_VALIDATE: Operation = Operation {
    name: "VoucherValidate",
    document: r"mutation VoucherValidate($code: String!, $channel: String!, $checkoutId: ID, $lines: [CheckoutLineInput!]!) {
  voucherValidate(code: $code, channel: $channel, checkoutId: $checkoutId, lines: $lines) {
    voucher { code discountAmount }
    errors { field message code }
  }
}",
};

// =============================================================================
// Inputs
// =============================================================================

/// One line of a checkout or voucher request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineInput {
    pub variant_id: VariantId,
    pub quantity: u32,
}

// =============================================================================
// Payloads
// =============================================================================

/// Validation error attached to a mutation payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MutationError {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Variants the server rejected, when it reports them.
    #[serde(default)]
    pub variants: Option<Vec<VariantId>>,
}

impl MutationError {
    /// Message for display, falling back to the code.
    #[must_use]
    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "Request rejected".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateData {
    pub token_create: TokenCreatePayload,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreatePayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub errors: Vec<MutationError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshData {
    pub token_refresh: TokenRefreshPayload,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshPayload {
    #[serde(default)]
    pub token: Option<String>,
    /// Some backends rotate the refresh token as well.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub errors: Vec<MutationError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCreateData {
    pub checkout_create: CheckoutCreatePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCreatePayload {
    #[serde(default)]
    pub checkout: Option<CheckoutRef>,
    #[serde(default)]
    pub errors: Vec<MutationError>,
}

/// Identity of a remote checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRef {
    pub id: CheckoutId,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutData {
    pub checkout: Option<CheckoutRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherValidateData {
    pub voucher_validate: VoucherValidatePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoucherValidatePayload {
    #[serde(default)]
    pub voucher: Option<VoucherRef>,
    #[serde(default)]
    pub errors: Vec<MutationError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherRef {
    pub code: String,
    pub discount_amount: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_create_payload_with_rejected_variants() {
        let data: CheckoutCreateData = serde_json::from_value(serde_json::json!({
            "checkoutCreate": {
                "checkout": null,
                "errors": [{
                    "field": "quantity",
                    "message": "Could not add items Rose Mist. Only 0 remaining in stock.",
                    "code": "INSUFFICIENT_STOCK",
                    "variants": ["v-rose"]
                }]
            }
        }))
        .unwrap();

        let error = &data.checkout_create.errors[0];
        assert_eq!(error.code.as_deref(), Some("INSUFFICIENT_STOCK"));
        assert_eq!(error.variants.as_deref(), Some(&[VariantId::new("v-rose")][..]));
    }

    #[test]
    fn test_voucher_amount_parses_decimal_string() {
        let data: VoucherValidateData = serde_json::from_value(serde_json::json!({
            "voucherValidate": { "voucher": { "code": "SALE10", "discountAmount": "12.50" } }
        }))
        .unwrap();
        let voucher = data.voucher_validate.voucher.unwrap();
        assert_eq!(voucher.discount_amount, Decimal::new(1250, 2));
        assert!(data.voucher_validate.errors.is_empty());
    }

    #[test]
    fn test_mutation_error_describe_falls_back_to_code() {
        let error = MutationError {
            field: None,
            message: None,
            code: Some("INVALID".to_string()),
            variants: None,
        };
        assert_eq!(error.describe(), "INVALID");
    }

    #[test]
    fn test_documents_name_their_operation() {
        for op in [TOKEN_CREATE, TOKEN_REFRESH, CHECKOUT_CREATE, CHECKOUT, VOUCHER_VALIDATE] {
            assert!(op.document.contains(op.name), "{} missing from document", op.name);
        }
    }
}
