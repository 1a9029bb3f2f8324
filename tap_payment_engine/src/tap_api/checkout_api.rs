use std::fmt::Debug;

use log::*;

use crate::{
    db_types::OrderId,
    tap_api::{
        credential_api::CredentialApi,
        errors::{CheckoutApiError, LinkApiError},
    },
    traits::{CheckoutRequest, CheckoutSession, MerchantLinkManagement, OrderManagement, PaymentProvider},
};

/// Knobs for checkout session creation, set once from server configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Name reported to the provider as the marketplace collecting the fee.
    pub marketplace_name: String,
    /// The marketplace's cut of every order, as an integer percentage.
    pub fee_percent: u8,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self { marketplace_name: "Tap".to_string(), fee_percent: 10 }
    }
}

/// `CheckoutApi` opens a provider checkout session for an order, charging through the *vendor's* linked
/// merchant account (with the marketplace fee skimmed by the provider).
pub struct CheckoutApi<B, P> {
    credentials: CredentialApi<B, P>,
    settings: CheckoutSettings,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(credentials: CredentialApi<B, P>, settings: CheckoutSettings) -> Self {
        Self { credentials, settings }
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: OrderManagement + MerchantLinkManagement,
    P: PaymentProvider,
{
    /// Open a checkout session for `order_id` on behalf of `buyer_id`.
    ///
    /// The order must exist and belong to the buyer; otherwise `OrderNotFound` (the two cases are not
    /// distinguishable from outside). A vendor with no usable link yields `PaymentUnavailable`, which the
    /// server maps to a 503 rather than a 500 — it is the vendor's configuration problem, not ours.
    pub async fn start_checkout(
        &self,
        order_id: OrderId,
        buyer_id: &str,
    ) -> Result<CheckoutSession, CheckoutApiError> {
        let db = self.credentials.db();
        let order = db.fetch_order(order_id).await?.ok_or(CheckoutApiError::OrderNotFound(order_id))?;
        if order.buyer_id != buyer_id {
            debug!("🧾️ Buyer {buyer_id} asked to pay order {order_id}, which is not theirs.");
            return Err(CheckoutApiError::OrderNotFound(order_id));
        }
        let access_token =
            self.credentials.get_valid_access_token(order.vendor_id).await.map_err(|e| match e {
                LinkApiError::NotLinked(_) | LinkApiError::RefreshFailed(_) => {
                    CheckoutApiError::PaymentUnavailable(e.to_string())
                },
                LinkApiError::DatabaseError(msg) => CheckoutApiError::DatabaseError(msg),
            })?;
        let request = CheckoutRequest {
            external_reference: order.id.value().to_string(),
            title: format!("{} order {}", self.settings.marketplace_name, order.id),
            amount: order.total_price,
            currency: order.currency.clone(),
            payer_email: None,
            marketplace_fee: order.total_price.percentage(self.settings.fee_percent),
            marketplace: self.settings.marketplace_name.clone(),
        };
        let session = self
            .credentials
            .provider()
            .create_checkout(&request, &access_token)
            .await
            .map_err(|e| CheckoutApiError::ProviderError(e.to_string()))?;
        db.set_preference_id(order.id, &session.preference_id).await?;
        info!("🧾️ Checkout session {} opened for order {order_id}.", session.preference_id);
        Ok(session)
    }
}
