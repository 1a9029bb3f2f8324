//! Adapts the Mercado Pago REST client to the engine's [`PaymentProvider`] seam.
//!
//! The engine speaks in its own normalised types (`TokenGrant`, `PaymentRecord`, …); this module is where
//! the provider's field names and conventions are translated, and nowhere else.

use mercado_tools::{
    MercadoApi,
    MercadoApiError,
    NewPreference,
    PaymentResponse,
    PreferenceItem,
    PreferencePayer,
    TokenResponse,
};
use tap_payment_engine::traits::{
    CheckoutRequest,
    CheckoutSession,
    PaymentProvider,
    PaymentRecord,
    ProviderError,
    TokenGrant,
};

#[derive(Clone)]
pub struct MercadoProvider {
    api: MercadoApi,
}

impl MercadoProvider {
    pub fn new(api: MercadoApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &MercadoApi {
        &self.api
    }
}

fn provider_error(e: MercadoApiError) -> ProviderError {
    match e {
        MercadoApiError::QueryError { status, message } => ProviderError::Rejected { status, body: message },
        other => ProviderError::Unreachable(other.to_string()),
    }
}

fn grant_from_response(response: TokenResponse) -> TokenGrant {
    TokenGrant {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_in: response.expires_in,
        external_merchant_id: response.user_id.map(|id| id.to_string()),
        live_mode: response.live_mode.unwrap_or(false),
    }
}

fn record_from_payment(payment: PaymentResponse) -> PaymentRecord {
    PaymentRecord {
        id: payment.id.to_string(),
        status: payment.status,
        external_reference: payment.external_reference,
        preference_id: payment.preference_id,
    }
}

impl PaymentProvider for MercadoProvider {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let response = self.api.exchange_code(code).await.map_err(provider_error)?;
        Ok(grant_from_response(response))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let response = self.api.refresh_token(refresh_token).await.map_err(provider_error)?;
        Ok(grant_from_response(response))
    }

    async fn fetch_payment(&self, payment_id: &str, access_token: &str) -> Result<PaymentRecord, ProviderError> {
        let payment = self.api.get_payment(payment_id, access_token).await.map_err(provider_error)?;
        Ok(record_from_payment(payment))
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
        access_token: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        let preference = NewPreference {
            items: vec![PreferenceItem {
                id: request.external_reference.clone(),
                title: request.title.clone(),
                description: None,
                quantity: 1,
                currency_id: request.currency.clone(),
                unit_price: request.amount.to_major_units(),
            }],
            payer: request.payer_email.clone().map(|email| PreferencePayer { email: Some(email) }),
            external_reference: request.external_reference.clone(),
            marketplace: Some(request.marketplace.clone()),
            marketplace_fee: Some(request.marketplace_fee.to_major_units()),
            back_urls: None,
            auto_return: Some("approved".to_string()),
            notification_url: None,
        };
        let response = self.api.create_preference(&preference, access_token).await.map_err(provider_error)?;
        Ok(CheckoutSession { preference_id: response.id, init_point: response.init_point })
    }
}
