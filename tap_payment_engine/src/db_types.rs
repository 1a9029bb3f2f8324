use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use tap_common::Cents;
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
/// Orders are identified by the marketplace's numeric order id. The same number travels to the provider as
/// the checkout `external_reference` and comes back in payment resources and webhook notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub i64);

#[derive(Debug, Clone, Error)]
#[error("Invalid order id: {0}")]
pub struct OrderIdParseError(String);

impl FromStr for OrderId {
    type Err = OrderIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| OrderIdParseError(format!("{s}: {e}")))
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// Order payment status, driven one-way by provider truth.
///
/// `Pending` is the only non-terminal status. Once an order reaches a terminal status, a later notification
/// may re-assert the same status (redeliveries are routine) but may never change it. See
/// [`OrderStatusType::may_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Payment has been initiated but not resolved.
    Pending,
    /// The provider approved the payment.
    Approved,
    /// The provider rejected the payment.
    Rejected,
    /// The payment was cancelled, refunded or charged back.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }

    /// The one-way transition law: pending orders can move anywhere, terminal orders can only be
    /// re-asserted.
    pub fn may_transition_to(&self, new: OrderStatusType) -> bool {
        *self == OrderStatusType::Pending || *self == new
    }

    /// Map a provider payment status onto an order status. Unknown statuses map to `None` and must leave
    /// the order untouched.
    pub fn from_provider_status(status: &str) -> Option<Self> {
        match status.to_ascii_lowercase().as_str() {
            "approved" => Some(OrderStatusType::Approved),
            "pending" | "in_process" => Some(OrderStatusType::Pending),
            "rejected" => Some(OrderStatusType::Rejected),
            "cancelled" | "refunded" | "charged_back" => Some(OrderStatusType::Cancelled),
            _ => None,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Approved => write!(f, "Approved"),
            OrderStatusType::Rejected => write!(f, "Rejected"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status in database: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// The slice of the marketplace order that the payment core reads and writes. Everything else about an
/// order (line items, addresses, fulfilment) belongs to the surrounding CRUD system.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub vendor_id: i64,
    pub buyer_id: String,
    pub total_price: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_id: Option<String>,
    pub preference_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Vendor        --------------------------------------------------------
/// A seller tenant. Only the ownership information the payment core needs is modelled.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vendor {
    pub id: i64,
    pub owner_id: String,
    pub display_name: String,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
/// The fields the marketplace supplies when an order enters the system. Order intake itself is out of
/// scope for the payment core; this type exists for seeding and integration tests.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub vendor_id: i64,
    pub buyer_id: String,
    pub total_price: Cents,
    pub currency: String,
}

impl NewOrder {
    pub fn new(vendor_id: i64, buyer_id: impl Into<String>, total_price: Cents) -> Self {
        Self {
            vendor_id,
            buyer_id: buyer_id.into(),
            total_price,
            currency: tap_common::DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

//--------------------------------------     MerchantLink      -------------------------------------------------------
/// The persisted OAuth credential record tying a vendor to its provider merchant account.
/// Exactly one row exists per linked vendor; relinking replaces the row.
#[derive(Debug, Clone, FromRow)]
pub struct MerchantLink {
    pub id: i64,
    pub vendor_id: i64,
    /// The provider's identifier for the merchant account (`user_id` in token responses).
    pub external_merchant_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Production vs sandbox credentials. Never conflated; the flag is whatever the provider reported at
    /// link time.
    pub live_mode: bool,
    /// `None` means the provider did not report an expiry. Such links are used as-is and never refreshed
    /// proactively.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantLink {
    /// True when the access token is expired, or will expire within `buffer`.
    pub fn needs_refresh(&self, buffer: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + buffer >= expires_at,
            None => false,
        }
    }
}

//--------------------------------------    NewMerchantLink    -------------------------------------------------------
/// The payload for creating or replacing a vendor's merchant link after a successful code exchange.
#[derive(Debug, Clone)]
pub struct NewMerchantLink {
    pub vendor_id: i64,
    pub external_merchant_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub live_mode: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------   CredentialRotation  -------------------------------------------------------
/// The fields that change when a token refresh succeeds. Everything else on the link
/// (merchant id, live mode) is left alone.
#[derive(Debug, Clone)]
pub struct CredentialRotation {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------  OrderPaymentUpdate   -------------------------------------------------------
/// A reconciliation write against an order: the mapped status, the provider payment id, and the checkout
/// preference id when it is newly known.
#[derive(Debug, Clone)]
pub struct OrderPaymentUpdate {
    pub status: OrderStatusType,
    pub payment_id: String,
    pub preference_id: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(OrderStatusType::from_provider_status("approved"), Some(OrderStatusType::Approved));
        assert_eq!(OrderStatusType::from_provider_status("pending"), Some(OrderStatusType::Pending));
        assert_eq!(OrderStatusType::from_provider_status("in_process"), Some(OrderStatusType::Pending));
        assert_eq!(OrderStatusType::from_provider_status("rejected"), Some(OrderStatusType::Rejected));
        assert_eq!(OrderStatusType::from_provider_status("cancelled"), Some(OrderStatusType::Cancelled));
        assert_eq!(OrderStatusType::from_provider_status("refunded"), Some(OrderStatusType::Cancelled));
        assert_eq!(OrderStatusType::from_provider_status("charged_back"), Some(OrderStatusType::Cancelled));
        assert_eq!(OrderStatusType::from_provider_status("CHARGED_BACK"), Some(OrderStatusType::Cancelled));
        assert_eq!(OrderStatusType::from_provider_status("authorized"), None);
        assert_eq!(OrderStatusType::from_provider_status(""), None);
    }

    #[test]
    fn transition_law() {
        use OrderStatusType::*;
        // Pending can go anywhere, including staying pending.
        for target in [Pending, Approved, Rejected, Cancelled] {
            assert!(Pending.may_transition_to(target));
        }
        // Terminal statuses can only be re-asserted.
        for current in [Approved, Rejected, Cancelled] {
            for target in [Pending, Approved, Rejected, Cancelled] {
                assert_eq!(current.may_transition_to(target), current == target);
            }
        }
    }

    #[test]
    fn refresh_buffer_applies_only_when_expiry_is_known() {
        let mut link = MerchantLink {
            id: 1,
            vendor_id: 42,
            external_merchant_id: "M1".to_string(),
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            live_mode: false,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let buffer = Duration::minutes(5);
        // Unknown expiry: never proactively refreshed.
        assert!(!link.needs_refresh(buffer));
        // Expires well outside the buffer.
        link.expires_at = Some(Utc::now() + Duration::hours(6));
        assert!(!link.needs_refresh(buffer));
        // Expires inside the buffer.
        link.expires_at = Some(Utc::now() + Duration::minutes(4));
        assert!(link.needs_refresh(buffer));
        // Already expired.
        link.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(link.needs_refresh(buffer));
    }

    #[test]
    fn order_id_parses_numeric_references() {
        assert_eq!("77".parse::<OrderId>().unwrap(), OrderId(77));
        assert_eq!(" 42 ".parse::<OrderId>().unwrap(), OrderId(42));
        assert!("pref-123".parse::<OrderId>().is_err());
        assert!("".parse::<OrderId>().is_err());
    }
}
