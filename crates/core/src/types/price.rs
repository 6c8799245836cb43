//! Decimal price helpers.
//!
//! Line prices are plain [`Decimal`] amounts in the store currency; the
//! storefront never mixes currencies inside one cart, so no currency code is
//! carried per line.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building price values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Discount percentage outside `1..=100`.
    #[error("discount percent must be between 1 and 100, got {0}")]
    InvalidDiscountPercent(u8),
}

/// A percentage discount advertised on a variant, in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// Create a discount percentage.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::InvalidDiscountPercent` for `0` or anything above `100`.
    pub const fn new(percent: u8) -> Result<Self, PriceError> {
        if percent == 0 || percent > 100 {
            return Err(PriceError::InvalidDiscountPercent(percent));
        }
        Ok(Self(percent))
    }

    /// The raw percentage.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Apply the discount to an amount, rounded half-up to cents.
    #[must_use]
    pub fn apply(self, amount: Decimal) -> Decimal {
        let keep = Decimal::from(100 - u32::from(self.0));
        (amount * keep / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl TryFrom<u8> for DiscountPercent {
    type Error = PriceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountPercent> for u8 {
    fn from(value: DiscountPercent) -> Self {
        value.0
    }
}

/// Format an amount with exactly two decimal places (e.g. `19.90`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
