//! Integration tests for promo code application.
//!
//! Run with: cargo test -p storefront-sync-integration-tests --test voucher

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use storefront_sync::storage::MemoryStore;
use storefront_sync::{GraphQLResponse, SyncEngine, SyncError};
use storefront_sync_core::{LineDetails, VariantId, VoucherState};
use storefront_sync_integration_tests::{ScriptedTransport, checkout_created, ops, voucher_valid};

async fn engine_with_tee(transport: &ScriptedTransport) -> SyncEngine<ScriptedTransport> {
    let engine = SyncEngine::start(transport.clone(), MemoryStore::shared(), "default-channel").await;
    engine
        .cart()
        .add_line(VariantId::new("v1"), 2, LineDetails::new("Tee", Decimal::from(25)));
    engine
}

fn rejected(message: &str) -> GraphQLResponse {
    GraphQLResponse::data(serde_json::json!({
        "voucherValidate": {
            "voucher": null,
            "errors": [{ "field": "code", "message": message, "code": "INVALID" }]
        }
    }))
}

#[tokio::test]
async fn test_apply_records_discount() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;

    let voucher = engine.vouchers().apply("SALE10").await.unwrap();

    assert_eq!(voucher.code(), Some("SALE10"));
    assert_eq!(voucher.discount_amount(), Decimal::from(10));
    let state = engine.cart().state();
    assert_eq!(state.voucher, voucher);
    assert_eq!(state.total(), Decimal::from(40));

    let call = transport.last_call_to(ops::VOUCHER_VALIDATE).unwrap();
    assert_eq!(call.variables["code"], "SALE10");
    assert_eq!(call.variables["channel"], "default-channel");
    assert_eq!(call.variables["checkoutId"], serde_json::Value::Null);
    assert_eq!(
        call.variables["lines"],
        serde_json::json!([{ "variantId": "v1", "quantity": 2 }])
    );
}

#[tokio::test]
async fn test_applying_same_code_twice_validates_once() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;

    let first = engine.vouchers().apply("SALE10").await.unwrap();
    let second = engine.vouchers().apply(" SALE10 ").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.calls_to(ops::VOUCHER_VALIDATE), 1);
}

#[tokio::test]
async fn test_reapplying_in_other_case_validates_once() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;

    engine.vouchers().apply("sale10").await.unwrap();
    let again = engine.vouchers().apply("sale10").await.unwrap();

    assert_eq!(again.code(), Some("SALE10"));
    assert_eq!(transport.calls_to(ops::VOUCHER_VALIDATE), 1);
}

#[tokio::test]
async fn test_concurrent_double_submit_validates_once() {
    let transport = ScriptedTransport::new()
        .respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"))
        .delay(ops::VOUCHER_VALIDATE, Duration::from_millis(30));
    let engine = engine_with_tee(&transport).await;

    let (a, b) = tokio::join!(
        engine.vouchers().apply("SALE10"),
        engine.vouchers().apply("SALE10")
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(transport.calls_to(ops::VOUCHER_VALIDATE), 1);
}

#[tokio::test]
async fn test_rejected_code_leaves_state_untouched() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;
    engine.vouchers().apply("SALE10").await.unwrap();

    let transport = transport.respond(ops::VOUCHER_VALIDATE, rejected("Promo code has expired"));
    let err = engine.vouchers().apply("OLDCODE").await.unwrap_err();

    assert_eq!(err, SyncError::VoucherInvalid("Promo code has expired".to_string()));
    assert_eq!(engine.cart().voucher().code(), Some("SALE10"));
    assert_eq!(transport.calls_to(ops::VOUCHER_VALIDATE), 2);
}

#[tokio::test]
async fn test_top_level_error_is_voucher_invalid() {
    let transport = ScriptedTransport::new()
        .respond(ops::VOUCHER_VALIDATE, GraphQLResponse::error("Voucher not found"));
    let engine = engine_with_tee(&transport).await;

    let err = engine.vouchers().apply("NOPE").await.unwrap_err();

    assert_eq!(err, SyncError::VoucherInvalid("Voucher not found".to_string()));
    assert!(!engine.cart().voucher().is_active());
}

#[tokio::test]
async fn test_zero_discount_is_rejected() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("FREESHIP", "0"));
    let engine = engine_with_tee(&transport).await;

    let err = engine.vouchers().apply("FREESHIP").await.unwrap_err();

    assert_eq!(
        err,
        SyncError::VoucherInvalid("Promo code FREESHIP does not apply to your cart".to_string())
    );
    assert_eq!(engine.cart().voucher(), VoucherState::none());
}

#[tokio::test]
async fn test_blank_code_makes_no_request() {
    let transport = ScriptedTransport::new();
    let engine = engine_with_tee(&transport).await;

    let err = engine.vouchers().apply("   ").await.unwrap_err();

    assert!(matches!(err, SyncError::VoucherInvalid(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_network_failure_is_not_voucher_invalid() {
    let transport = ScriptedTransport::new().fail(ops::VOUCHER_VALIDATE);
    let engine = engine_with_tee(&transport).await;

    let err = engine.vouchers().apply("SALE10").await.unwrap_err();

    assert!(matches!(err, SyncError::Network(_)));
}

#[tokio::test]
async fn test_remove_clears_voucher() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;
    engine.vouchers().apply("SALE10").await.unwrap();

    engine.vouchers().remove();

    assert_eq!(engine.cart().voucher(), VoucherState::none());
    assert_eq!(engine.cart().state().total(), Decimal::from(50));
}

#[tokio::test]
async fn test_checkout_id_is_sent_when_created() {
    let transport = ScriptedTransport::new()
        .respond(ops::CHECKOUT_CREATE, checkout_created("abc"))
        .respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;
    engine.cart().create_remote_checkout().await.unwrap();

    engine.vouchers().apply("SALE10").await.unwrap();

    let call = transport.last_call_to(ops::VOUCHER_VALIDATE).unwrap();
    assert_eq!(call.variables["checkoutId"], "abc");
}

#[tokio::test]
async fn test_line_changes_keep_voucher() {
    let transport = ScriptedTransport::new().respond(ops::VOUCHER_VALIDATE, voucher_valid("SALE10", "10"));
    let engine = engine_with_tee(&transport).await;
    engine.vouchers().apply("SALE10").await.unwrap();

    engine.cart().increase(&VariantId::new("v1"));

    assert!(engine.cart().voucher().is_applied("SALE10"));
}
