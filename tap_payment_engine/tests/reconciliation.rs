//! Tests for webhook reconciliation: resolution strategies, idempotence, and the no-regression guarantee.
//! Storage is a real in-memory SQLite database; the provider is mocked.

mod support;

use chrono::{Duration, Utc};
use support::{memory_db, payment_record, MockProvider};
use tap_common::Secret;
use tap_payment_engine::{
    db_types::{NewMerchantLink, NewOrder, Order, OrderStatusType},
    traits::{MerchantLinkManagement, OrderManagement, PaymentRecord, ProviderError},
    CredentialApi,
    PaymentNotice,
    ReconciliationApi,
    ReconciliationOutcome,
};

struct Fixture {
    db: tap_payment_engine::SqliteDatabase,
    order: Order,
}

/// A vendor with a healthy link and one pending order.
async fn fixture() -> Fixture {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let link = NewMerchantLink {
        vendor_id: vendor.id,
        external_merchant_id: "MERCHANT-1".to_string(),
        access_token: "vendor-token".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        live_mode: false,
        expires_at: Some(Utc::now() + Duration::hours(6)),
    };
    db.upsert_merchant_link(link).await.unwrap();
    let order = db.insert_order(NewOrder::new(vendor.id, "buyer-1", 125_000.into())).await.unwrap();
    Fixture { db, order }
}

fn api(
    db: tap_payment_engine::SqliteDatabase,
    provider: MockProvider,
    fallback: Option<&str>,
) -> ReconciliationApi<tap_payment_engine::SqliteDatabase, MockProvider> {
    let credentials = CredentialApi::new(db, provider);
    ReconciliationApi::new(credentials, fallback.map(|t| Secret::new(t.to_string())))
}

fn notice(payment_id: Option<&str>, reference: Option<String>) -> PaymentNotice {
    PaymentNotice { payment_id: payment_id.map(String::from), external_reference: reference }
}

#[tokio::test]
async fn approved_payment_approves_the_order() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    let expected_reference = reference.clone();
    provider
        .expect_fetch_payment()
        .withf(move |id, token| id == "P1" && token == "vendor-token")
        .times(1)
        .returning(move |_, _| Ok(payment_record("P1", "approved", Some(expected_reference.clone()))));
    let api = api(db.clone(), provider, None);

    let outcome = api.process_notification(notice(Some("P1"), Some(reference))).await.unwrap();
    let ReconciliationOutcome::Updated(updated) = outcome else {
        panic!("Expected the order to be updated, got {outcome:?}");
    };
    assert_eq!(updated.status, OrderStatusType::Approved);
    assert_eq!(updated.payment_id.as_deref(), Some("P1"));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Approved);
}

#[tokio::test]
async fn duplicate_deliveries_converge() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    let expected_reference = reference.clone();
    provider
        .expect_fetch_payment()
        .times(2)
        .returning(move |_, _| Ok(payment_record("P1", "approved", Some(expected_reference.clone()))));
    let api = api(db.clone(), provider, None);

    let n = notice(Some("P1"), Some(reference));
    let first = api.process_notification(n.clone()).await.unwrap();
    let second = api.process_notification(n).await.unwrap();
    assert!(matches!(first, ReconciliationOutcome::Updated(_)));
    assert!(matches!(second, ReconciliationOutcome::Updated(_)));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Approved);
    assert_eq!(stored.payment_id.as_deref(), Some("P1"));
}

#[tokio::test]
async fn stale_pending_never_regresses_an_approved_order() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    // First delivery says approved; a late redelivery still reports pending.
    let mut seq = mockall::Sequence::new();
    let r1 = reference.clone();
    provider
        .expect_fetch_payment()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, _| Ok(payment_record("P1", "approved", Some(r1.clone()))));
    let r2 = reference.clone();
    provider
        .expect_fetch_payment()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, _| Ok(payment_record("P1", "pending", Some(r2.clone()))));
    let api = api(db.clone(), provider, None);

    api.process_notification(notice(Some("P1"), Some(reference.clone()))).await.unwrap();
    let outcome = api.process_notification(notice(Some("P1"), Some(reference))).await.unwrap();
    assert!(matches!(
        outcome,
        ReconciliationOutcome::Conflict {
            current: OrderStatusType::Approved,
            incoming: OrderStatusType::Pending,
            ..
        }
    ));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Approved);
}

#[tokio::test]
async fn empty_notification_is_acknowledged_without_provider_calls() {
    let Fixture { db, .. } = fixture().await;
    let api = api(db, MockProvider::new(), Some("app-token"));
    let outcome = api.process_notification(notice(None, None)).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::NothingActionable));
}

#[tokio::test]
async fn falls_back_to_the_application_token_when_the_vendor_fetch_fails() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    let r = reference.clone();
    provider.expect_fetch_payment().withf(|_, token| token == "vendor-token").times(1).returning(|_, _| {
        Err(ProviderError::Rejected { status: 404, body: "payment not found for merchant".to_string() })
    });
    provider
        .expect_fetch_payment()
        .withf(|_, token| token == "app-token")
        .times(1)
        .returning(move |_, _| Ok(payment_record("P1", "approved", Some(r.clone()))));
    let api = api(db.clone(), provider, Some("app-token"));

    let outcome = api.process_notification(notice(Some("P1"), Some(reference))).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::Updated(_)));
}

#[tokio::test]
async fn unresolvable_payment_mutates_nothing() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    provider.expect_fetch_payment().times(1).returning(|_, _| {
        Err(ProviderError::Unreachable("connection timed out".to_string()))
    });
    // No application token configured, so there is no second strategy.
    let api = api(db.clone(), provider, None);

    let outcome = api.process_notification(notice(Some("P1"), Some(reference))).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::PaymentUnresolved));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Pending);
    assert!(stored.payment_id.is_none());
}

#[tokio::test]
async fn payment_reference_overrides_the_notification_candidate() {
    // The notification names one order, the authoritative payment another; the payment wins.
    let Fixture { db, order } = fixture().await;
    let decoy = db.insert_order(NewOrder::new(order.vendor_id, "buyer-2", 50_000.into())).await.unwrap();
    let real_reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    let r = real_reference.clone();
    provider
        .expect_fetch_payment()
        .times(1)
        .returning(move |_, _| Ok(payment_record("P1", "approved", Some(r.clone()))));
    let api = api(db.clone(), provider, None);

    let outcome =
        api.process_notification(notice(Some("P1"), Some(decoy.id.value().to_string()))).await.unwrap();
    let ReconciliationOutcome::Updated(updated) = outcome else {
        panic!("Expected the order to be updated");
    };
    assert_eq!(updated.id, order.id);
    let untouched = db.fetch_order(decoy.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn unknown_references_are_acknowledged() {
    let Fixture { db, .. } = fixture().await;
    let mut provider = MockProvider::new();
    provider
        .expect_fetch_payment()
        .withf(|_, token| token == "app-token")
        .times(1)
        .returning(|_, _| Ok(payment_record("P1", "approved", Some("999999".to_string()))));
    let api = api(db, provider, Some("app-token"));

    let outcome = api.process_notification(notice(Some("P1"), None)).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::OrderNotFound { .. }));
}

#[tokio::test]
async fn unrecognised_statuses_leave_the_order_alone() {
    let Fixture { db, order } = fixture().await;
    let reference = order.id.value().to_string();
    let mut provider = MockProvider::new();
    let r = reference.clone();
    provider
        .expect_fetch_payment()
        .times(1)
        .returning(move |_, _| Ok(payment_record("P1", "authorized", Some(r.clone()))));
    let api = api(db.clone(), provider, None);

    let outcome = api.process_notification(notice(Some("P1"), Some(reference))).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::UnrecognisedStatus { .. }));
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Pending);
    assert!(stored.payment_id.is_none());
}

#[tokio::test]
async fn payment_without_any_reference_is_acknowledged() {
    let Fixture { db, .. } = fixture().await;
    let mut provider = MockProvider::new();
    provider.expect_fetch_payment().times(1).returning(|_, _| {
        Ok(PaymentRecord {
            id: "P1".to_string(),
            status: "approved".to_string(),
            external_reference: None,
            preference_id: None,
        })
    });
    let api = api(db, provider, Some("app-token"));
    let outcome = api.process_notification(notice(Some("P1"), None)).await.unwrap();
    assert!(matches!(outcome, ReconciliationOutcome::MissingReference { .. }));
}
