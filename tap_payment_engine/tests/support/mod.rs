#![allow(dead_code)]

use mockall::mock;
use tap_payment_engine::{
    traits::{
        CheckoutRequest,
        CheckoutSession,
        PaymentProvider,
        PaymentRecord,
        ProviderError,
        TokenGrant,
    },
    SqliteDatabase,
};

// A single in-memory connection; every connection to `sqlite::memory:` is its own database, so the pool
// must never grow beyond one.
pub async fn memory_db() -> SqliteDatabase {
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Could not create in-memory database")
}

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;
        async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
        async fn fetch_payment(&self, payment_id: &str, access_token: &str) -> Result<PaymentRecord, ProviderError>;
        async fn create_checkout(&self, request: &CheckoutRequest, access_token: &str) -> Result<CheckoutSession, ProviderError>;
    }
}

pub fn token_grant(access_token: &str, refresh_token: Option<&str>, expires_in: Option<i64>) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(String::from),
        expires_in,
        external_merchant_id: Some("MERCHANT-1".to_string()),
        live_mode: false,
    }
}

pub fn payment_record(id: &str, status: &str, reference: Option<String>) -> PaymentRecord {
    PaymentRecord { id: id.to_string(), status: status.to_string(), external_reference: reference, preference_id: None }
}
