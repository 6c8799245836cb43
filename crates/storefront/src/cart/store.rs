//! The cart store: in-memory state, mutations and snapshot persistence.

use std::sync::Arc;

use storefront_sync_core::{
    CartLine, CartLines, CheckoutHandle, CheckoutId, HydrationSource, LineChange, LineDetails, VariantId,
    VoucherState,
};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::stock;
use super::{CartNotice, CartState, CartHydrator, Hydration};
use crate::api::Transport;
use crate::api::operations::{self, CheckoutCreateData, CheckoutLineInput, MutationError};
use crate::error::{Result, SyncError};
use crate::orchestrator::RequestOrchestrator;
use crate::storage::{SharedStore, keys};

/// Capacity of the notice channel.
const NOTICE_CHANNEL_CAPACITY: usize = 16;

/// Observable cart state container.
///
/// Every mutation updates the state, notifies subscribers and then writes
/// the snapshot to storage. Derived figures are never stored.
///
/// Cheap to clone; clones share state.
pub struct CartStore<T> {
    inner: Arc<CartInner<T>>,
}

impl<T> Clone for CartStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for CartStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("channel", &self.inner.channel)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

struct CartInner<T> {
    orchestrator: RequestOrchestrator<T>,
    storage: SharedStore,
    channel: String,
    state: watch::Sender<CartState>,
    notices: broadcast::Sender<CartNotice>,
    /// Serialises remote checkout creation.
    checkout_lock: Mutex<()>,
    /// Serialises voucher application.
    voucher_lock: Mutex<()>,
}

impl<T> CartStore<T> {
    // =========================================================================
    // Observation
    // =========================================================================

    /// Receiver that sees every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Receiver for one-off notices such as stock removals.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<CartNotice> {
        self.inner.notices.subscribe()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn lines(&self) -> CartLines {
        self.inner.state.borrow().lines.clone()
    }

    #[must_use]
    pub fn line(&self, variant_id: &VariantId) -> Option<CartLine> {
        self.inner.state.borrow().lines.get(variant_id).cloned()
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutHandle {
        self.inner.state.borrow().checkout.clone()
    }

    #[must_use]
    pub fn voucher(&self) -> VoucherState {
        self.inner.state.borrow().voucher.clone()
    }

    #[must_use]
    pub fn source(&self) -> HydrationSource {
        self.inner.state.borrow().source
    }

    #[must_use]
    pub fn subtotal(&self) -> rust_decimal::Decimal {
        self.inner.state.borrow().subtotal()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.state.borrow().item_count()
    }

    /// Sales channel sent with remote calls.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    // =========================================================================
    // Line mutations
    // =========================================================================

    /// Add `quantity` units of a variant, merging with an existing line.
    #[instrument(skip(self, variant_id, details), fields(variant_id = %variant_id))]
    pub fn add_line(&self, variant_id: VariantId, quantity: u32, details: LineDetails) -> LineChange {
        let mut change = LineChange::Ignored;
        self.mutate(|state| {
            change = state.lines.add(variant_id, quantity, details);
            change != LineChange::Ignored
        });
        if change == LineChange::Ignored {
            debug!("Ignoring zero-quantity add");
        }
        change
    }

    /// Remove a line. Returns `false` if it was not in the cart.
    pub fn remove_line(&self, variant_id: &VariantId) -> bool {
        self.mutate(|state| state.lines.remove(variant_id).is_some())
    }

    /// Add one unit to a line.
    pub fn increase(&self, variant_id: &VariantId) -> bool {
        self.mutate(|state| state.lines.increase(variant_id))
    }

    /// Remove one unit from a line; the last unit removes the line.
    pub fn decrease(&self, variant_id: &VariantId) -> bool {
        self.mutate(|state| state.lines.decrease(variant_id))
    }

    /// Set a line's quantity; zero removes the line.
    pub fn set_quantity(&self, variant_id: &VariantId, quantity: u32) -> bool {
        self.mutate(|state| state.lines.set_quantity(variant_id, quantity))
    }

    /// Reset lines, checkout handle and voucher together.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        self.mutate(|state| {
            state.lines = CartLines::new();
            state.checkout = CheckoutHandle::none();
            state.voucher = VoucherState::none();
            true
        });
        debug!("Cart cleared");
    }

    /// Clear the cart after the remote checkout has been paid.
    #[instrument(skip(self))]
    pub fn complete_purchase(&self) {
        let checkout = self.checkout();
        info!(
            checkout_id = checkout.remote_id.as_ref().map(CheckoutId::as_str),
            "Purchase completed"
        );
        self.clear();
    }

    pub(crate) fn set_voucher(&self, voucher: VoucherState) {
        self.mutate(|state| {
            if state.voucher == voucher {
                return false;
            }
            state.voucher = voucher;
            true
        });
    }

    pub(crate) fn voucher_lock(&self) -> &Mutex<()> {
        &self.inner.voucher_lock
    }

    pub(crate) fn orchestrator(&self) -> &RequestOrchestrator<T> {
        &self.inner.orchestrator
    }

    /// Apply `f` to the state; notify and persist if it reports a change.
    fn mutate(&self, f: impl FnOnce(&mut CartState) -> bool) -> bool {
        let changed = self.inner.state.send_if_modified(f);
        if changed {
            self.persist();
        }
        changed
    }

    /// Write the snapshot. Failures are logged; memory stays authoritative.
    fn persist(&self) {
        let snapshot = self.inner.state.borrow().snapshot();
        let written = snapshot
            .to_json()
            .map_err(SyncError::from)
            .and_then(|json| {
                self.inner
                    .storage
                    .set_item(keys::CART, &json)
                    .map_err(SyncError::from)
            });
        if let Err(e) = written {
            warn!(error = %e, "Failed to persist cart snapshot");
        }
    }

    /// Remove lines named by a stock rejection and build the error to return.
    ///
    /// Rejected variant ids are used first; when none of them match a line,
    /// product names parsed from the messages are matched against titles.
    fn recover_from_stock_rejection(&self, messages: &[String], variants: &[VariantId]) -> SyncError {
        let names: Vec<String> = messages
            .iter()
            .flat_map(|m| stock::product_names(m))
            .collect();

        let mut removed = Vec::new();
        self.mutate(|state| {
            if !variants.is_empty() {
                removed = state.lines.remove_where(|line| variants.contains(&line.variant_id));
            }
            if removed.is_empty() && !names.is_empty() {
                removed = state
                    .lines
                    .remove_where(|line| stock::title_matches(&line.title, &names));
            }
            !removed.is_empty()
        });

        let titles: Vec<String> = removed.into_iter().map(|line| line.title).collect();
        if titles.is_empty() {
            warn!(?names, "Stock rejection did not match any cart line");
        } else {
            warn!(?titles, "Removed unavailable lines from cart");
            let _ = self.inner.notices.send(CartNotice::LinesRemoved {
                titles: titles.clone(),
            });
        }

        SyncError::StockUnavailable {
            products: if titles.is_empty() { names } else { titles },
            message: messages.join("; "),
        }
    }
}

impl<T: Transport> CartStore<T> {
    /// Store seeded from a hydration result.
    #[must_use]
    pub fn new(
        orchestrator: RequestOrchestrator<T>,
        storage: SharedStore,
        channel: impl Into<String>,
        hydration: Hydration,
    ) -> Self {
        let (state, _) = watch::channel(CartState::from_hydration(hydration));
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CartInner {
                orchestrator,
                storage,
                channel: channel.into(),
                state,
                notices,
                checkout_lock: Mutex::new(()),
                voucher_lock: Mutex::new(()),
            }),
        }
    }

    /// Hydrate from storage and the server, then build the store.
    pub async fn hydrate(
        orchestrator: RequestOrchestrator<T>,
        storage: SharedStore,
        channel: impl Into<String>,
    ) -> Self {
        let hydration = CartHydrator::new(orchestrator.clone(), Arc::clone(&storage))
            .hydrate()
            .await;
        Self::new(orchestrator, storage, channel, hydration)
    }

    /// Create the server-side checkout for the current lines.
    ///
    /// Returns the existing handle without a network call when one is
    /// already stored. On a stock rejection the affected lines are removed,
    /// a [`CartNotice::LinesRemoved`] is published and
    /// `SyncError::StockUnavailable` is returned.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Domain` for an empty cart or a rejected checkout,
    /// `SyncError::StockUnavailable` after stock recovery, or any session or
    /// transport error from the request.
    #[instrument(skip(self))]
    pub async fn create_remote_checkout(&self) -> Result<CheckoutHandle> {
        let _guard = self.inner.checkout_lock.lock().await;

        let (checkout, lines) = {
            let state = self.inner.state.borrow();
            (state.checkout.clone(), state.lines.clone())
        };
        if checkout.is_created() {
            debug!("Remote checkout already exists");
            return Ok(checkout);
        }
        if lines.is_empty() {
            return Err(SyncError::Domain("Your cart is empty".to_string()));
        }

        let inputs = line_inputs(&lines);
        let result = self
            .inner
            .orchestrator
            .execute::<CheckoutCreateData>(
                &operations::CHECKOUT_CREATE,
                serde_json::json!({ "channel": self.inner.channel, "lines": inputs }),
            )
            .await;

        let payload = match result {
            Ok(data) => data.checkout_create,
            Err(SyncError::Domain(message)) if stock::is_stock_error(None, &message) => {
                return Err(self.recover_from_stock_rejection(&[message], &[]));
            }
            Err(e) => return Err(e),
        };

        if !payload.errors.is_empty() {
            return Err(self.checkout_rejected(&payload.errors));
        }

        let remote = payload
            .checkout
            .ok_or_else(|| SyncError::Domain("Checkout was not created".to_string()))?;
        let handle = CheckoutHandle::created(remote.id, remote.token);
        info!(checkout_id = ?handle.remote_id, "Remote checkout created");

        self.mutate(|state| {
            state.checkout = handle.clone();
            true
        });
        Ok(handle)
    }

    fn checkout_rejected(&self, errors: &[MutationError]) -> SyncError {
        let stock_errors: Vec<&MutationError> = errors
            .iter()
            .filter(|e| stock::is_stock_error(e.code.as_deref(), &e.describe()))
            .collect();

        if stock_errors.is_empty() {
            let message = errors
                .iter()
                .map(MutationError::describe)
                .collect::<Vec<_>>()
                .join("; ");
            return SyncError::Domain(message);
        }

        let messages: Vec<String> = stock_errors.iter().map(|e| e.describe()).collect();
        let variants: Vec<VariantId> = stock_errors
            .iter()
            .flat_map(|e| e.variants.clone().unwrap_or_default())
            .collect();
        self.recover_from_stock_rejection(&messages, &variants)
    }
}

/// `(variantId, quantity)` pairs for a checkout or voucher request.
pub(crate) fn line_inputs(lines: &CartLines) -> Vec<CheckoutLineInput> {
    lines
        .iter()
        .map(|line| CheckoutLineInput {
            variant_id: line.variant_id.clone(),
            quantity: line.quantity,
        })
        .collect()
}
