use mockall::mock;
use tap_payment_engine::{
    db_types::{CredentialRotation, MerchantLink, NewMerchantLink, Order, OrderId, OrderPaymentUpdate, Vendor},
    traits::{
        CheckoutRequest,
        CheckoutSession,
        MerchantLinkManagement,
        OrderManagement,
        PaymentProvider,
        PaymentRecord,
        PaymentUpdateOutcome,
        ProviderError,
        StorageError,
        TokenGrant,
        VendorManagement,
    },
};

mock! {
    pub Backend {}
    impl VendorManagement for Backend {
        async fn fetch_vendor(&self, vendor_id: i64) -> Result<Option<Vendor>, StorageError>;
    }
    impl MerchantLinkManagement for Backend {
        async fn fetch_merchant_link(&self, vendor_id: i64) -> Result<Option<MerchantLink>, StorageError>;
        async fn upsert_merchant_link(&self, link: NewMerchantLink) -> Result<MerchantLink, StorageError>;
        async fn rotate_link_credentials(&self, vendor_id: i64, rotation: CredentialRotation) -> Result<MerchantLink, StorageError>;
    }
    impl OrderManagement for Backend {
        async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StorageError>;
        async fn apply_payment_update(&self, id: OrderId, update: OrderPaymentUpdate) -> Result<PaymentUpdateOutcome, StorageError>;
        async fn set_preference_id(&self, id: OrderId, preference_id: &str) -> Result<(), StorageError>;
    }
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
