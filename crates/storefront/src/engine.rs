//! Wiring of the session, cart and voucher components.

use std::sync::Arc;

use tracing::info;

use crate::api::Transport;
use crate::cart::CartStore;
use crate::orchestrator::RequestOrchestrator;
use crate::session::SessionCoordinator;
use crate::storage::SharedStore;
use crate::voucher::VoucherApplier;

/// A started engine: hydrated cart plus the components around it.
///
/// Cheap to clone; clones share all state.
#[derive(Debug)]
pub struct SyncEngine<T> {
    session: SessionCoordinator<T>,
    orchestrator: RequestOrchestrator<T>,
    cart: CartStore<T>,
    vouchers: VoucherApplier<T>,
}

impl<T> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            orchestrator: self.orchestrator.clone(),
            cart: self.cart.clone(),
            vouchers: self.vouchers.clone(),
        }
    }
}

impl<T: Transport> SyncEngine<T> {
    /// Build every component over `transport` and `storage` and hydrate the cart.
    pub async fn start(transport: T, storage: SharedStore, channel: impl Into<String>) -> Self {
        let session = SessionCoordinator::new(transport, Arc::clone(&storage));
        let orchestrator = RequestOrchestrator::new(session.clone());
        let cart = CartStore::hydrate(orchestrator.clone(), storage, channel).await;
        let vouchers = VoucherApplier::new(cart.clone());

        info!(
            source = %cart.source(),
            lines = cart.lines().len(),
            authenticated = session.is_authenticated(),
            "Sync engine started"
        );

        Self {
            session,
            orchestrator,
            cart,
            vouchers,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &SessionCoordinator<T> {
        &self.session
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &RequestOrchestrator<T> {
        &self.orchestrator
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore<T> {
        &self.cart
    }

    #[must_use]
    pub const fn vouchers(&self) -> &VoucherApplier<T> {
        &self.vouchers
    }
}
