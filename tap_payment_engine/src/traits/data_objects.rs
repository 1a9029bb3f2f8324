use serde::{Deserialize, Serialize};
use tap_common::Cents;

use crate::db_types::{Order, OrderStatusType};

//--------------------------------------      TokenGrant       -------------------------------------------------------
/// The engine's view of a successful token-endpoint response, for both the code exchange and the refresh
/// grant. Provider-specific field names are normalised by the adapter.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds, when the provider reports one.
    pub expires_in: Option<i64>,
    /// The provider's merchant account id. Present on code exchanges; refresh responses may omit it.
    pub external_merchant_id: Option<String>,
    pub live_mode: bool,
}

//--------------------------------------     PaymentRecord     -------------------------------------------------------
/// The engine's view of an authoritative payment resource fetched from the provider.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: String,
    /// Raw provider status string; mapped via [`OrderStatusType::from_provider_status`].
    pub status: String,
    pub external_reference: Option<String>,
    pub preference_id: Option<String>,
}

//--------------------------------------    CheckoutRequest    -------------------------------------------------------
/// A request to open a checkout session for an order with the vendor's merchant account.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Our order id, carried as the provider-side external reference.
    pub external_reference: String,
    pub title: String,
    pub amount: Cents,
    pub currency: String,
    pub payer_email: Option<String>,
    /// The marketplace's cut, collected by the provider on our behalf.
    pub marketplace_fee: Cents,
    pub marketplace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub preference_id: String,
    /// The provider-hosted URL the buyer is sent to, when the provider returns one.
    pub init_point: Option<String>,
}

//--------------------------------------  PaymentUpdateOutcome -------------------------------------------------------
/// Result of the conditional reconciliation write. `Forbidden` means the row exists but the one-way
/// transition law blocked the write; the caller decides whether that is a conflict worth shouting about.
#[derive(Debug, Clone)]
pub enum PaymentUpdateOutcome {
    Applied(Order),
    Forbidden { current: OrderStatusType },
    NotFound,
}
