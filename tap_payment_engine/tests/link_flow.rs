//! Tests for completing the OAuth linking flow against an in-memory database and a mocked provider.

mod support;

use chrono::{Duration, Utc};
use support::{memory_db, token_grant, MockProvider};
use tap_payment_engine::{
    traits::{MerchantLinkManagement, ProviderError, TokenGrant},
    LinkFlowApi,
    LinkFlowError,
};

#[tokio::test]
async fn successful_exchange_creates_the_link() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let mut provider = MockProvider::new();
    provider
        .expect_exchange_code()
        .withf(|code| code == "auth-code-1")
        .times(1)
        .returning(|_| Ok(token_grant("access-1", Some("refresh-1"), Some(3600))));
    let api = LinkFlowApi::new(db.clone(), provider);

    let link = api.complete_link(vendor.id, "auth-code-1").await.unwrap();
    assert_eq!(link.vendor_id, vendor.id);
    assert_eq!(link.external_merchant_id, "MERCHANT-1");
    assert_eq!(link.access_token, "access-1");
    assert_eq!(link.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!link.live_mode);
    let expires_at = link.expires_at.expect("expires_in was given, so expiry must be set");
    let expected = Utc::now() + Duration::seconds(3600);
    assert!((expires_at - expected).num_seconds().abs() <= 2);

    // And it is now visible through the store.
    assert!(db.fetch_merchant_link(vendor.id).await.unwrap().is_some());
}

#[tokio::test]
async fn relinking_replaces_the_previous_credentials() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let mut provider = MockProvider::new();
    provider
        .expect_exchange_code()
        .withf(|code| code == "code-1")
        .times(1)
        .returning(|_| Ok(token_grant("access-1", Some("refresh-1"), None)));
    provider.expect_exchange_code().withf(|code| code == "code-2").times(1).returning(|_| {
        Ok(TokenGrant {
            access_token: "access-2".to_string(),
            refresh_token: None,
            expires_in: None,
            external_merchant_id: Some("MERCHANT-2".to_string()),
            live_mode: true,
        })
    });
    let api = LinkFlowApi::new(db.clone(), provider);

    api.complete_link(vendor.id, "code-1").await.unwrap();
    let link = api.complete_link(vendor.id, "code-2").await.unwrap();
    assert_eq!(link.external_merchant_id, "MERCHANT-2");
    assert_eq!(link.access_token, "access-2");
    assert!(link.live_mode);
    assert!(link.expires_at.is_none());
}

#[tokio::test]
async fn provider_rejection_is_surfaced_with_the_error_body() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let mut provider = MockProvider::new();
    provider.expect_exchange_code().times(1).returning(|_| {
        Err(ProviderError::Rejected { status: 400, body: r#"{"error":"invalid_grant"}"#.to_string() })
    });
    let api = LinkFlowApi::new(db.clone(), provider);

    let err = api.complete_link(vendor.id, "bad-code").await.unwrap_err();
    let LinkFlowError::ExchangeRejected { status, body } = err else {
        panic!("Expected ExchangeRejected");
    };
    assert_eq!(status, 400);
    assert!(body.contains("invalid_grant"));
    // Nothing was persisted.
    assert!(db.fetch_merchant_link(vendor.id).await.unwrap().is_none());
}

#[tokio::test]
async fn a_grant_without_a_merchant_id_is_rejected() {
    let db = memory_db().await;
    let vendor = db.insert_vendor("user-abc", "Pasta Shop").await.unwrap();
    let mut provider = MockProvider::new();
    provider.expect_exchange_code().times(1).returning(|_| {
        Ok(TokenGrant {
            access_token: "access-1".to_string(),
            refresh_token: None,
            expires_in: None,
            external_merchant_id: None,
            live_mode: false,
        })
    });
    let api = LinkFlowApi::new(db.clone(), provider);
    let err = api.complete_link(vendor.id, "code").await.unwrap_err();
    assert!(matches!(err, LinkFlowError::MissingMerchantId));
    assert!(db.fetch_merchant_link(vendor.id).await.unwrap().is_none());
}
