//! Startup reconciliation of the persisted snapshot with the remote checkout.

use storefront_sync_core::{CheckoutHandle, HydrationSource, PersistedSnapshot};
use tracing::{debug, info, instrument, warn};

use crate::api::Transport;
use crate::api::operations::{self, CheckoutData};
use crate::orchestrator::RequestOrchestrator;
use crate::storage::{KeyValueStore, SharedStore, keys, read_item};

/// Initial cart contents and their provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hydration {
    pub snapshot: PersistedSnapshot,
    pub source: HydrationSource,
}

impl Hydration {
    const fn local(snapshot: PersistedSnapshot) -> Self {
        Self {
            snapshot,
            source: HydrationSource::LocalStorage,
        }
    }
}

/// Runs once at startup. `hydrate` consumes the hydrator.
pub struct CartHydrator<T> {
    orchestrator: RequestOrchestrator<T>,
    storage: SharedStore,
}

impl<T: Transport> CartHydrator<T> {
    #[must_use]
    pub const fn new(orchestrator: RequestOrchestrator<T>, storage: SharedStore) -> Self {
        Self {
            orchestrator,
            storage,
        }
    }

    /// Load the local snapshot and confirm its checkout with the server.
    ///
    /// The local line list always wins. A confirmed remote checkout only
    /// contributes its identity; any failure falls back to the snapshot as
    /// stored. Never fails.
    #[instrument(skip(self))]
    pub async fn hydrate(self) -> Hydration {
        let snapshot = load_snapshot(self.storage.as_ref());

        let Some(remote_id) = snapshot.checkout.remote_id.clone() else {
            debug!(lines = snapshot.lines.len(), "No remote checkout, using local snapshot");
            return Hydration::local(snapshot);
        };

        let fetched = self
            .orchestrator
            .execute::<CheckoutData>(
                &operations::CHECKOUT,
                serde_json::json!({ "id": remote_id }),
            )
            .await;

        match fetched {
            Ok(CheckoutData {
                checkout: Some(remote),
            }) => {
                info!(checkout_id = %remote.id, "Remote checkout confirmed");
                let token = remote.token.or(snapshot.checkout.remote_token);
                Hydration {
                    snapshot: PersistedSnapshot {
                        checkout: CheckoutHandle::created(remote.id, token),
                        lines: snapshot.lines,
                    },
                    source: HydrationSource::Api,
                }
            }
            Ok(CheckoutData { checkout: None }) => {
                warn!(checkout_id = %remote_id, "Remote checkout not found, using local snapshot");
                Hydration::local(snapshot)
            }
            Err(e) => {
                warn!(checkout_id = %remote_id, error = %e, "Remote checkout fetch failed, using local snapshot");
                Hydration::local(snapshot)
            }
        }
    }
}

/// Read the stored snapshot; a missing or unreadable one is an empty cart.
pub(crate) fn load_snapshot(storage: &dyn KeyValueStore) -> PersistedSnapshot {
    let Some(json) = read_item(storage, keys::CART) else {
        return PersistedSnapshot::default();
    };
    PersistedSnapshot::from_json(&json).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable cart snapshot");
        PersistedSnapshot::default()
    })
}
