//! Observable cart state, startup hydration and stock recovery.

mod hydrator;
mod stock;
mod store;

use rust_decimal::Decimal;
use serde::Serialize;
use storefront_sync_core::{CartLines, CheckoutHandle, HydrationSource, PersistedSnapshot, VoucherState};

pub use hydrator::{CartHydrator, Hydration};
pub use store::CartStore;
pub(crate) use store::line_inputs;

/// Everything the UI renders about the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    pub lines: CartLines,
    pub checkout: CheckoutHandle,
    pub voucher: VoucherState,
    /// Where the checkout linkage came from at startup.
    pub source: HydrationSource,
}

impl CartState {
    /// Initial state from a hydration result. Voucher state always starts empty.
    #[must_use]
    pub fn from_hydration(hydration: Hydration) -> Self {
        Self {
            lines: hydration.snapshot.lines,
            checkout: hydration.snapshot.checkout,
            voucher: VoucherState::none(),
            source: hydration.source,
        }
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.subtotal()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.item_count()
    }

    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.lines.savings()
    }

    /// Subtotal minus the voucher discount, never below zero.
    #[must_use]
    pub fn total(&self) -> Decimal {
        (self.subtotal() - self.voucher.discount_amount()).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The persisted projection of this state.
    #[must_use]
    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            checkout: self.checkout.clone(),
            lines: self.lines.clone(),
        }
    }
}

/// One-off events for the UI, separate from state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartNotice {
    /// Lines were dropped because the server rejected them for stock.
    LinesRemoved { titles: Vec<String> },
}
