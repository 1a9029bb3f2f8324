//! Tests for the token store/refresh service: proactive refresh, single-flight behaviour, and the
//! failure taxonomy. Storage is a real in-memory SQLite database; the provider is mocked.

mod support;

use chrono::{Duration, Utc};
use support::{memory_db, token_grant, MockProvider};
use tap_payment_engine::{
    db_types::NewMerchantLink,
    traits::{MerchantLinkManagement, ProviderError},
    CredentialApi,
    LinkApiError,
};

async fn seeded_link(
    db: &tap_payment_engine::SqliteDatabase,
    expires_in: Option<Duration>,
    refresh_token: Option<&str>,
) -> i64 {
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let link = NewMerchantLink {
        vendor_id: vendor.id,
        external_merchant_id: "MERCHANT-1".to_string(),
        access_token: "stored-token".to_string(),
        refresh_token: refresh_token.map(String::from),
        live_mode: false,
        expires_at: expires_in.map(|d| Utc::now() + d),
    };
    db.upsert_merchant_link(link).await.unwrap();
    vendor.id
}

#[tokio::test]
async fn unlinked_vendor_fails_with_not_linked() {
    let db = memory_db().await;
    let provider = MockProvider::new();
    let api = CredentialApi::new(db, provider);
    let err = api.get_valid_access_token(42).await.unwrap_err();
    assert!(matches!(err, LinkApiError::NotLinked(42)));
}

#[tokio::test]
async fn fresh_token_is_returned_without_any_provider_call() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, Some(Duration::hours(6)), Some("refresh-1")).await;
    // No expectations on the mock: any provider call would panic the test.
    let api = CredentialApi::new(db, MockProvider::new());
    assert_eq!(api.get_valid_access_token(vendor_id).await.unwrap(), "stored-token");
    // And a second call is still a no-op.
    assert_eq!(api.get_valid_access_token(vendor_id).await.unwrap(), "stored-token");
}

#[tokio::test]
async fn unknown_expiry_skips_proactive_refresh() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, None, Some("refresh-1")).await;
    let api = CredentialApi::new(db, MockProvider::new());
    assert_eq!(api.get_valid_access_token(vendor_id).await.unwrap(), "stored-token");
}

#[tokio::test]
async fn near_expiry_refreshes_exactly_once() {
    let db = memory_db().await;
    // Inside the five-minute refresh buffer.
    let vendor_id = seeded_link(&db, Some(Duration::minutes(4)), Some("refresh-1")).await;
    let mut provider = MockProvider::new();
    provider
        .expect_refresh_token()
        .withf(|token| token == "refresh-1")
        .times(1)
        .returning(|_| Ok(token_grant("fresh-token", Some("refresh-2"), Some(21_600))));
    let api = CredentialApi::new(db.clone(), provider);

    assert_eq!(api.get_valid_access_token(vendor_id).await.unwrap(), "fresh-token");
    // The rotation was persisted: new access and refresh tokens, pushed-out expiry.
    let link = db.fetch_merchant_link(vendor_id).await.unwrap().unwrap();
    assert_eq!(link.access_token, "fresh-token");
    assert_eq!(link.refresh_token.as_deref(), Some("refresh-2"));
    assert!(link.expires_at.unwrap() > Utc::now() + Duration::hours(5));
    // The next call sees a fresh token and does not hit the provider again (times(1) above).
    assert_eq!(api.get_valid_access_token(vendor_id).await.unwrap(), "fresh-token");
}

#[tokio::test]
async fn refresh_token_is_kept_when_provider_does_not_rotate_it() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, Some(Duration::minutes(1)), Some("refresh-1")).await;
    let mut provider = MockProvider::new();
    provider
        .expect_refresh_token()
        .times(1)
        .returning(|_| Ok(token_grant("fresh-token", None, Some(21_600))));
    let api = CredentialApi::new(db.clone(), provider);
    api.get_valid_access_token(vendor_id).await.unwrap();
    let link = db.fetch_merchant_link(vendor_id).await.unwrap().unwrap();
    assert_eq!(link.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn missing_refresh_token_is_a_refresh_failure() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, Some(Duration::minutes(1)), None).await;
    let api = CredentialApi::new(db, MockProvider::new());
    let err = api.get_valid_access_token(vendor_id).await.unwrap_err();
    assert!(matches!(err, LinkApiError::RefreshFailed(_)));
}

#[tokio::test]
async fn failed_refresh_leaves_stored_credentials_untouched() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, Some(Duration::minutes(1)), Some("refresh-1")).await;
    let mut provider = MockProvider::new();
    provider.expect_refresh_token().times(1).returning(|_| {
        Err(ProviderError::Rejected { status: 400, body: r#"{"error":"invalid_grant"}"#.to_string() })
    });
    let api = CredentialApi::new(db.clone(), provider);
    let err = api.get_valid_access_token(vendor_id).await.unwrap_err();
    let LinkApiError::RefreshFailed(msg) = err else {
        panic!("Expected RefreshFailed");
    };
    assert!(msg.contains("invalid_grant"));
    let link = db.fetch_merchant_link(vendor_id).await.unwrap().unwrap();
    assert_eq!(link.access_token, "stored-token");
    assert_eq!(link.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn concurrent_refreshes_are_single_flight() {
    let db = memory_db().await;
    let vendor_id = seeded_link(&db, Some(Duration::minutes(1)), Some("refresh-1")).await;
    let mut provider = MockProvider::new();
    // The whole point: no matter how many callers race, the provider sees exactly one refresh grant.
    provider
        .expect_refresh_token()
        .times(1)
        .returning(|_| Ok(token_grant("fresh-token", Some("refresh-2"), Some(21_600))));
    let api = CredentialApi::new(db, provider);

    let (a, b, c) = tokio::join!(
        api.get_valid_access_token(vendor_id),
        api.get_valid_access_token(vendor_id),
        api.get_valid_access_token(vendor_id),
    );
    assert_eq!(a.unwrap(), "fresh-token");
    assert_eq!(b.unwrap(), "fresh-token");
    assert_eq!(c.unwrap(), "fresh-token");
}
