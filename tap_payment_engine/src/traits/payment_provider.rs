use thiserror::Error;

use crate::traits::data_objects::{CheckoutRequest, CheckoutSession, PaymentRecord, TokenGrant};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider answered with a non-2xx status. The body is kept verbatim for diagnostics; callers
    /// must take care not to relay secrets through it (the provider does not echo ours).
    #[error("Provider rejected the request with status {status}. {body}")]
    Rejected { status: u16, body: String },
    /// Transport-level failure: DNS, TLS, connection reset, or the bounded request timeout.
    #[error("Could not reach the provider. {0}")]
    Unreachable(String),
}

/// The payment provider's API surface, as the engine sees it.
///
/// The server wires in an adapter over the real REST client; tests substitute mocks. All calls are plain
/// request/response with a bounded timeout — there is no streaming and no retry loop at this layer, since
/// each caller has its own retry story (the webhook relies on provider redelivery, the refresh service
/// surfaces `RefreshFailed` to its caller).
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// Exchange an authorization code for merchant credentials (`grant_type=authorization_code`).
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Renew an access token (`grant_type=refresh_token`). The grant may rotate the refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// Fetch the authoritative payment resource with the given access token.
    async fn fetch_payment(&self, payment_id: &str, access_token: &str) -> Result<PaymentRecord, ProviderError>;

    /// Open a checkout session on behalf of the merchant owning `access_token`.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
        access_token: &str,
    ) -> Result<CheckoutSession, ProviderError>;
}
