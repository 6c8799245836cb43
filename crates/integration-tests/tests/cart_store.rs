//! Integration tests for cart mutations, remote checkout and stock recovery.
//!
//! Run with: cargo test -p storefront-sync-integration-tests --test cart_store

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_sync::storage::{KeyValueStore, MemoryStore, keys};
use storefront_sync::{CartNotice, GraphQLResponse, SyncEngine, SyncError};
use storefront_sync_core::{
    DiscountPercent, LineChange, LineDetails, PersistedSnapshot, VariantId,
};
use storefront_sync_integration_tests::{ScriptedTransport, checkout_created, ops, voucher_valid};

async fn engine(
    transport: &ScriptedTransport,
    store: Arc<MemoryStore>,
) -> SyncEngine<ScriptedTransport> {
    SyncEngine::start(transport.clone(), store, "default-channel").await
}

fn details(title: &str, price: i64) -> LineDetails {
    LineDetails::new(title, Decimal::from(price))
}

fn stored_snapshot(store: &MemoryStore) -> PersistedSnapshot {
    PersistedSnapshot::from_json(&store.get_item(keys::CART).unwrap()).unwrap()
}

// ============================================================================
// Line rules
// ============================================================================

#[tokio::test]
async fn test_same_variant_merges_into_one_line() {
    let store = MemoryStore::shared();
    let engine = engine(&ScriptedTransport::new(), store.clone()).await;
    let cart = engine.cart();
    let id = VariantId::new("v1");

    assert_eq!(cart.add_line(id.clone(), 1, details("Tee", 10)), LineChange::Added);
    assert_eq!(cart.add_line(id.clone(), 2, details("Tee", 10)), LineChange::Merged);

    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.line(&id).unwrap().quantity, 3);
    assert_eq!(stored_snapshot(&store).lines.item_count(), 3);
}

#[tokio::test]
async fn test_merge_backfills_sale_pricing() {
    let engine = engine(&ScriptedTransport::new(), MemoryStore::shared()).await;
    let cart = engine.cart();
    let id = VariantId::new("v1");
    let percent = DiscountPercent::new(20).unwrap();

    cart.add_line(id.clone(), 1, details("Tee", 8));
    cart.add_line(
        id.clone(),
        1,
        details("Tee", 8).with_sale(Decimal::from(10), percent),
    );

    let line = cart.line(&id).unwrap();
    assert_eq!(line.original_unit_price, Some(Decimal::from(10)));
    assert_eq!(line.discount_percent, Some(percent));
    assert_eq!(cart.state().savings(), Decimal::from(4));
}

#[tokio::test]
async fn test_decreasing_last_unit_removes_line() {
    let store = MemoryStore::shared();
    let engine = engine(&ScriptedTransport::new(), store.clone()).await;
    let cart = engine.cart();
    let id = VariantId::new("v1");

    cart.add_line(id.clone(), 1, details("Tee", 10));
    assert!(cart.decrease(&id));

    assert!(cart.line(&id).is_none());
    assert!(cart.lines().is_empty());
    assert!(stored_snapshot(&store).lines.is_empty());
}

#[tokio::test]
async fn test_quantity_adjustments() {
    let engine = engine(&ScriptedTransport::new(), MemoryStore::shared()).await;
    let cart = engine.cart();
    let id = VariantId::new("v1");

    cart.add_line(id.clone(), 1, details("Tee", 10));
    cart.increase(&id);
    cart.increase(&id);
    assert_eq!(cart.item_count(), 3);

    cart.set_quantity(&id, 5);
    assert_eq!(cart.subtotal(), Decimal::from(50));

    assert!(cart.set_quantity(&id, 0));
    assert!(!cart.increase(&id));
}

#[tokio::test]
async fn test_cart_mutations_make_no_network_calls() {
    let transport = ScriptedTransport::new();
    let engine = engine(&transport, MemoryStore::shared()).await;
    let cart = engine.cart();

    cart.add_line(VariantId::new("v1"), 2, details("Tee", 10));
    cart.decrease(&VariantId::new("v1"));
    cart.remove_line(&VariantId::new("v1"));
    cart.clear();

    assert!(transport.calls().is_empty());
}

// ============================================================================
// Remote checkout
// ============================================================================

#[tokio::test]
async fn test_create_remote_checkout_stores_handle_once() {
    let transport = ScriptedTransport::new().respond(ops::CHECKOUT_CREATE, checkout_created("abc"));
    let store = MemoryStore::shared();
    let engine = engine(&transport, store.clone()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v1"), 2, details("Tee", 10));
    cart.add_line(VariantId::new("v2"), 1, details("Cap", 5));

    let handle = cart.create_remote_checkout().await.unwrap();
    let again = cart.create_remote_checkout().await.unwrap();

    assert_eq!(handle.remote_id.as_ref().unwrap().as_str(), "abc");
    assert_eq!(handle.remote_token.as_deref(), Some("abc-token"));
    assert_eq!(again, handle);
    assert_eq!(transport.calls_to(ops::CHECKOUT_CREATE), 1);
    assert_eq!(stored_snapshot(&store).checkout, handle);

    let call = transport.last_call_to(ops::CHECKOUT_CREATE).unwrap();
    assert_eq!(call.variables["channel"], "default-channel");
    assert_eq!(
        call.variables["lines"],
        serde_json::json!([
            { "variantId": "v1", "quantity": 2 },
            { "variantId": "v2", "quantity": 1 }
        ])
    );
}

#[tokio::test]
async fn test_checkout_validation_error_is_domain() {
    let transport = ScriptedTransport::new().respond(
        ops::CHECKOUT_CREATE,
        GraphQLResponse::data(serde_json::json!({
            "checkoutCreate": {
                "checkout": null,
                "errors": [{ "field": "email", "message": "Enter a valid email", "code": "INVALID" }]
            }
        })),
    );
    let engine = engine(&transport, MemoryStore::shared()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v1"), 1, details("Tee", 10));

    let err = cart.create_remote_checkout().await.unwrap_err();

    assert_eq!(err, SyncError::Domain("Enter a valid email".to_string()));
    assert_eq!(cart.lines().len(), 1);
    assert!(!cart.checkout().is_created());
}

// ============================================================================
// Stock recovery
// ============================================================================

#[tokio::test]
async fn test_stock_error_removes_named_line() {
    let transport = ScriptedTransport::new().respond(
        ops::CHECKOUT_CREATE,
        GraphQLResponse::error("«Rose Mist» remaining in stock: 0"),
    );
    let store = MemoryStore::shared();
    let engine = engine(&transport, store.clone()).await;
    let cart = engine.cart();
    let mut notices = cart.notices();
    cart.add_line(VariantId::new("v-rose"), 1, details("Rose Mist Body Oil", 24));
    cart.add_line(VariantId::new("v-salt"), 2, details("Sea Salt Scrub", 12));

    let err = cart.create_remote_checkout().await.unwrap_err();

    assert!(matches!(
        &err,
        SyncError::StockUnavailable { products, .. } if products == &["Rose Mist Body Oil"]
    ));
    assert!(cart.line(&VariantId::new("v-rose")).is_none());
    assert_eq!(cart.line(&VariantId::new("v-salt")).unwrap().quantity, 2);
    assert!(!cart.checkout().is_created());
    assert_eq!(
        notices.recv().await.unwrap(),
        CartNotice::LinesRemoved {
            titles: vec!["Rose Mist Body Oil".to_string()]
        }
    );
    assert_eq!(stored_snapshot(&store).lines.len(), 1);
}

#[tokio::test]
async fn test_stock_error_with_variant_ids_removes_exact_lines() {
    let transport = ScriptedTransport::new().respond(
        ops::CHECKOUT_CREATE,
        GraphQLResponse::data(serde_json::json!({
            "checkoutCreate": {
                "checkout": null,
                "errors": [{
                    "field": "quantity",
                    "message": "Insufficient stock for some items",
                    "code": "INSUFFICIENT_STOCK",
                    "variants": ["v-salt"]
                }]
            }
        })),
    );
    let engine = engine(&transport, MemoryStore::shared()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v-rose"), 1, details("Rose Mist Body Oil", 24));
    cart.add_line(VariantId::new("v-salt"), 1, details("Sea Salt Scrub", 12));

    let err = cart.create_remote_checkout().await.unwrap_err();

    assert!(matches!(err, SyncError::StockUnavailable { .. }));
    assert!(cart.line(&VariantId::new("v-salt")).is_none());
    assert!(cart.line(&VariantId::new("v-rose")).is_some());
}

#[tokio::test]
async fn test_could_not_add_message_is_parsed() {
    let transport = ScriptedTransport::new().respond(
        ops::CHECKOUT_CREATE,
        GraphQLResponse::data(serde_json::json!({
            "checkoutCreate": {
                "checkout": null,
                "errors": [{
                    "field": "quantity",
                    "message": "Could not add items Sea Salt. Only 0 remaining in stock.",
                    "code": "INSUFFICIENT_STOCK"
                }]
            }
        })),
    );
    let engine = engine(&transport, MemoryStore::shared()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v-rose"), 1, details("Rose Mist Body Oil", 24));
    cart.add_line(VariantId::new("v-salt"), 1, details("Sea Salt Scrub", 12));

    cart.create_remote_checkout().await.unwrap_err();

    assert!(cart.line(&VariantId::new("v-salt")).is_none());
    assert!(cart.line(&VariantId::new("v-rose")).is_some());
}

// ============================================================================
// Clear
// ============================================================================

#[tokio::test]
async fn test_clear_resets_everything_together() {
    let transport = ScriptedTransport::new()
        .respond(ops::CHECKOUT_CREATE, checkout_created("abc"))
        .respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let store = MemoryStore::shared();
    let engine = engine(&transport, store.clone()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v1"), 3, details("Tee", 10));
    cart.create_remote_checkout().await.unwrap();
    engine.vouchers().apply("SALE10").await.unwrap();
    let mut changes = cart.subscribe();

    cart.clear();

    let state = changes.borrow_and_update().clone();
    assert!(state.lines.is_empty());
    assert_eq!(state.voucher.code(), None);
    assert_eq!(state.voucher.discount_amount(), Decimal::ZERO);
    assert_eq!(state.checkout.remote_id, None);
    assert_eq!(state.checkout.remote_token, None);

    let stored = stored_snapshot(&store);
    assert!(stored.lines.is_empty());
    assert!(!stored.checkout.is_created());
}

#[tokio::test]
async fn test_complete_purchase_clears_cart() {
    let transport = ScriptedTransport::new().respond(ops::CHECKOUT_CREATE, checkout_created("abc"));
    let engine = engine(&transport, MemoryStore::shared()).await;
    let cart = engine.cart();
    cart.add_line(VariantId::new("v1"), 1, details("Tee", 10));
    cart.create_remote_checkout().await.unwrap();

    cart.complete_purchase();

    assert!(cart.state().is_empty());
    assert!(!cart.checkout().is_created());
}
