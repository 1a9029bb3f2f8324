//! Storage-level tests for merchant links and the conditional order update, against an in-memory SQLite
//! database with the real migrations applied.

mod support;

use chrono::{Duration, Utc};
use support::memory_db;
use tap_payment_engine::{
    db_types::{CredentialRotation, NewMerchantLink, NewOrder, OrderPaymentUpdate, OrderStatusType},
    traits::{MerchantLinkManagement, OrderManagement, PaymentUpdateOutcome, StorageError, VendorManagement},
};

fn new_link(vendor_id: i64) -> NewMerchantLink {
    NewMerchantLink {
        vendor_id,
        external_merchant_id: "MERCHANT-1".to_string(),
        access_token: "access-1".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        live_mode: false,
        expires_at: Some(Utc::now() + Duration::hours(6)),
    }
}

#[tokio::test]
async fn vendors_and_ownership() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let fetched = db.fetch_vendor(vendor.id).await.unwrap().expect("Vendor should exist");
    assert_eq!(fetched.owner_id, "user-abc");
    assert_eq!(fetched.display_name, "Pasta Shop");
    assert!(db.fetch_vendor(vendor.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn linking_is_an_upsert() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    assert!(db.fetch_merchant_link(vendor.id).await.unwrap().is_none());

    let link = db.upsert_merchant_link(new_link(vendor.id)).await.unwrap();
    assert_eq!(link.vendor_id, vendor.id);
    assert_eq!(link.external_merchant_id, "MERCHANT-1");
    assert_eq!(link.access_token, "access-1");

    // Relinking replaces the row wholesale; it is a recovery path, not an error.
    let relink = NewMerchantLink {
        external_merchant_id: "MERCHANT-2".to_string(),
        access_token: "access-2".to_string(),
        refresh_token: None,
        live_mode: true,
        expires_at: None,
        ..new_link(vendor.id)
    };
    let link = db.upsert_merchant_link(relink).await.unwrap();
    assert_eq!(link.external_merchant_id, "MERCHANT-2");
    assert_eq!(link.access_token, "access-2");
    assert!(link.refresh_token.is_none());
    assert!(link.live_mode);
    assert!(link.expires_at.is_none());

    // Still exactly one row for the vendor.
    let fetched = db.fetch_merchant_link(vendor.id).await.unwrap().expect("Link should exist");
    assert_eq!(fetched.id, link.id);
}

#[tokio::test]
async fn rotation_only_touches_credentials() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    db.upsert_merchant_link(new_link(vendor.id)).await.unwrap();

    let new_expiry = Utc::now() + Duration::hours(12);
    let rotation = CredentialRotation {
        access_token: "access-2".to_string(),
        refresh_token: Some("refresh-2".to_string()),
        expires_at: Some(new_expiry),
    };
    let link = db.rotate_link_credentials(vendor.id, rotation).await.unwrap();
    assert_eq!(link.access_token, "access-2");
    assert_eq!(link.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(link.external_merchant_id, "MERCHANT-1");
    let stored_expiry = link.expires_at.expect("Expiry should be set");
    assert!((stored_expiry - new_expiry).num_seconds().abs() <= 1);
}

#[tokio::test]
async fn rotating_a_missing_link_fails() {
    let db = memory_db().await;
    let rotation = CredentialRotation { access_token: "x".into(), refresh_token: None, expires_at: None };
    let err = db.rotate_link_credentials(999, rotation).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn payment_update_moves_pending_orders() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let order = db.insert_order(NewOrder::new(vendor.id, "buyer-1", 125_000.into())).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.payment_id.is_none());

    let update = OrderPaymentUpdate {
        status: OrderStatusType::Approved,
        payment_id: "P1".to_string(),
        preference_id: Some("pref-1".to_string()),
    };
    let outcome = db.apply_payment_update(order.id, update).await.unwrap();
    let PaymentUpdateOutcome::Applied(updated) = outcome else {
        panic!("Expected the update to apply");
    };
    assert_eq!(updated.status, OrderStatusType::Approved);
    assert_eq!(updated.payment_id.as_deref(), Some("P1"));
    assert_eq!(updated.preference_id.as_deref(), Some("pref-1"));
}

#[tokio::test]
async fn terminal_status_cannot_regress() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let order = db.insert_order(NewOrder::new(vendor.id, "buyer-1", 125_000.into())).await.unwrap();
    let approve = OrderPaymentUpdate {
        status: OrderStatusType::Approved,
        payment_id: "P1".to_string(),
        preference_id: None,
    };
    db.apply_payment_update(order.id, approve.clone()).await.unwrap();

    // A stale `pending` redelivery must bounce off.
    let stale = OrderPaymentUpdate {
        status: OrderStatusType::Pending,
        payment_id: "P1".to_string(),
        preference_id: None,
    };
    let outcome = db.apply_payment_update(order.id, stale).await.unwrap();
    assert!(matches!(outcome, PaymentUpdateOutcome::Forbidden { current: OrderStatusType::Approved }));
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Approved);

    // Re-asserting the terminal status is fine (idempotent redelivery).
    let outcome = db.apply_payment_update(order.id, approve).await.unwrap();
    assert!(matches!(outcome, PaymentUpdateOutcome::Applied(_)));

    // But a different terminal status is a conflict.
    let cancel = OrderPaymentUpdate {
        status: OrderStatusType::Cancelled,
        payment_id: "P1".to_string(),
        preference_id: None,
    };
    let outcome = db.apply_payment_update(order.id, cancel).await.unwrap();
    assert!(matches!(outcome, PaymentUpdateOutcome::Forbidden { current: OrderStatusType::Approved }));
}

#[tokio::test]
async fn preference_id_is_kept_when_update_carries_none() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let order = db.insert_order(NewOrder::new(vendor.id, "buyer-1", 50_000.into())).await.unwrap();
    db.set_preference_id(order.id, "pref-original").await.unwrap();

    let update = OrderPaymentUpdate {
        status: OrderStatusType::Approved,
        payment_id: "P1".to_string(),
        preference_id: None,
    };
    let PaymentUpdateOutcome::Applied(updated) = db.apply_payment_update(order.id, update).await.unwrap() else {
        panic!("Expected the update to apply");
    };
    assert_eq!(updated.preference_id.as_deref(), Some("pref-original"));
}

#[tokio::test]
async fn updating_an_unknown_order_reports_not_found() {
    let db = memory_db().await;
    let update = OrderPaymentUpdate {
        status: OrderStatusType::Approved,
        payment_id: "P1".to_string(),
        preference_id: None,
    };
    let outcome = db.apply_payment_update(404.into(), update).await.unwrap();
    assert!(matches!(outcome, PaymentUpdateOutcome::NotFound));
}
