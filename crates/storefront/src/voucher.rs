//! Promo code application.

use storefront_sync_core::VoucherState;
use tracing::{debug, info, instrument};

use crate::api::Transport;
use crate::api::operations::{self, VoucherValidateData};
use crate::cart::CartStore;
use crate::cart::line_inputs;
use crate::error::{Result, SyncError};

/// Validates promo codes against the cart and records the discount.
///
/// Applications are serialised per cart: a double-submit of the same code
/// waits for the first round trip and then short-circuits.
pub struct VoucherApplier<T> {
    cart: CartStore<T>,
}

impl<T> Clone for VoucherApplier<T> {
    fn clone(&self) -> Self {
        Self {
            cart: self.cart.clone(),
        }
    }
}

impl<T> std::fmt::Debug for VoucherApplier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoucherApplier")
            .field("voucher", &self.cart.voucher())
            .finish()
    }
}

impl<T: Transport> VoucherApplier<T> {
    #[must_use]
    pub const fn new(cart: CartStore<T>) -> Self {
        Self { cart }
    }

    /// Apply `code` to the cart.
    ///
    /// Re-applying the active code, in any letter case, returns the current
    /// state without a server call. A rejected code leaves the voucher state untouched.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::VoucherInvalid` for an empty or rejected code, or
    /// any session or transport error from the request.
    #[instrument(skip(self))]
    pub async fn apply(&self, code: &str) -> Result<VoucherState> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SyncError::VoucherInvalid("Enter a promo code".to_string()));
        }

        let _guard = self.cart.voucher_lock().lock().await;

        let current = self.cart.voucher();
        if current.is_applied(code) {
            debug!("Voucher already applied");
            return Ok(current);
        }

        let state = self.cart.state();
        let variables = serde_json::json!({
            "code": code,
            "channel": self.cart.channel(),
            "checkoutId": state.checkout.remote_id,
            "lines": line_inputs(&state.lines),
        });

        let payload = match self
            .cart
            .orchestrator()
            .execute::<VoucherValidateData>(&operations::VOUCHER_VALIDATE, variables)
            .await
        {
            Ok(data) => data.voucher_validate,
            Err(SyncError::Domain(message)) => return Err(SyncError::VoucherInvalid(message)),
            Err(e) => return Err(e),
        };

        if let Some(error) = payload.errors.first() {
            return Err(SyncError::VoucherInvalid(error.describe()));
        }

        let voucher = payload
            .voucher
            .and_then(|v| VoucherState::active(v.code, v.discount_amount))
            .ok_or_else(|| {
                SyncError::VoucherInvalid(format!("Promo code {code} does not apply to your cart"))
            })?;

        info!(code = voucher.code(), amount = %voucher.discount_amount(), "Voucher applied");
        self.cart.set_voucher(voucher.clone());
        Ok(voucher)
    }

    /// Drop the active voucher.
    pub fn remove(&self) {
        self.cart.set_voucher(VoucherState::none());
    }
}
