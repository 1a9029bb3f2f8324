use std::fmt::Debug;

use log::*;
use tap_common::Secret;

use crate::{
    db_types::{Order, OrderId, OrderPaymentUpdate, OrderStatusType},
    tap_api::{credential_api::CredentialApi, errors::ReconciliationError},
    traits::{MerchantLinkManagement, OrderManagement, PaymentProvider, PaymentRecord, PaymentUpdateOutcome},
};

//--------------------------------------     PaymentNotice     -------------------------------------------------------
/// The identifiers salvaged from an inbound notification. The webhook payload shape varies by notification
/// type, so by the time a notice reaches the engine it has been boiled down to "maybe a payment id, maybe
/// an external reference". Either may be missing or junk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentNotice {
    pub payment_id: Option<String>,
    pub external_reference: Option<String>,
}

//--------------------------------------  ReconciliationOutcome ------------------------------------------------------
/// Every way a notification can be *handled*. Only genuine internal failures are errors; all of these are
/// acknowledged to the provider with a 200 so it stops redelivering.
#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// The payload carried neither a payment id nor an external reference.
    NothingActionable,
    /// No authoritative payment resource could be fetched with any available credentials. Nothing is
    /// mutated — the raw notification fields are never trusted as payment truth.
    PaymentUnresolved,
    /// The payment resolved but carried no usable order reference.
    MissingReference { payment_id: String },
    /// The reference did not map to a known order.
    OrderNotFound { reference: String },
    /// The provider reported a status this system does not recognise; the order is left untouched.
    UnrecognisedStatus { order_id: OrderId, status: String },
    /// A stale or out-of-order delivery tried to move a terminal order; blocked and logged.
    Conflict { order_id: OrderId, current: OrderStatusType, incoming: OrderStatusType },
    /// The order was brought in line with provider truth (possibly a no-op re-assertion).
    Updated(Order),
}

//--------------------------------------   ReconciliationApi   -------------------------------------------------------
/// `ReconciliationApi` maps asynchronous payment notifications onto order state.
///
/// Notifications arrive duplicated, out of order, and in half a dozen shapes. The invariants this API
/// maintains, regardless of what arrives:
/// * order state only ever changes to match an authoritative payment resource fetched from the provider;
/// * a terminal status is never regressed by a stale delivery;
/// * processing the same notification twice converges on the same state with no duplicate side effects.
pub struct ReconciliationApi<B, P> {
    credentials: CredentialApi<B, P>,
    /// Application-level fallback token for payments that cannot be attributed to a vendor up front.
    fallback_token: Option<Secret<String>>,
}

impl<B, P> Debug for ReconciliationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, P> ReconciliationApi<B, P> {
    pub fn new(credentials: CredentialApi<B, P>, fallback_token: Option<Secret<String>>) -> Self {
        Self { credentials, fallback_token }
    }
}

impl<B, P> ReconciliationApi<B, P>
where
    B: OrderManagement + MerchantLinkManagement,
    P: PaymentProvider,
{
    fn db(&self) -> &B {
        self.credentials.db()
    }

    /// Process one notification to completion. See the module invariants; the returned outcome says what
    /// happened, and `Err` is reserved for internal failures that warrant a 5xx (and thus a redelivery).
    pub async fn process_notification(
        &self,
        notice: PaymentNotice,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let PaymentNotice { payment_id, external_reference } = notice;
        if payment_id.is_none() && external_reference.is_none() {
            debug!("🔁️ Notification carried no identifiers at all. Nothing to do.");
            return Ok(ReconciliationOutcome::NothingActionable);
        }
        let payment = match self.resolve_payment(payment_id.as_deref(), external_reference.as_deref()).await? {
            Some(p) => p,
            None => {
                info!(
                    "🔁️ Could not resolve payment {payment_id:?} (reference {external_reference:?}) with any \
                     available credentials. Acknowledging without mutating anything."
                );
                return Ok(ReconciliationOutcome::PaymentUnresolved);
            },
        };
        // The payment resource is the source of truth for the order reference; the notification's own
        // candidate is only a fallback.
        let reference = match payment.external_reference.clone().or(external_reference) {
            Some(r) => r,
            None => {
                info!("🔁️ Payment {} has no external reference. Nothing to reconcile against.", payment.id);
                return Ok(ReconciliationOutcome::MissingReference { payment_id: payment.id });
            },
        };
        let order_id = match reference.parse::<OrderId>() {
            Ok(id) => id,
            Err(_) => {
                info!("🔁️ External reference {reference:?} is not an order id. Ignoring.");
                return Ok(ReconciliationOutcome::OrderNotFound { reference });
            },
        };
        let Some(order) = self.db().fetch_order(order_id).await? else {
            warn!("🔁️ Payment {} references order {order_id}, which does not exist.", payment.id);
            return Ok(ReconciliationOutcome::OrderNotFound { reference });
        };
        let Some(new_status) = OrderStatusType::from_provider_status(&payment.status) else {
            info!(
                "🔁️ Payment {} for order {order_id} has unrecognised status {:?}. Leaving order as {}.",
                payment.id, payment.status, order.status
            );
            return Ok(ReconciliationOutcome::UnrecognisedStatus { order_id, status: payment.status });
        };
        let update = OrderPaymentUpdate {
            status: new_status,
            payment_id: payment.id.clone(),
            preference_id: payment.preference_id.clone(),
        };
        match self.db().apply_payment_update(order_id, update).await? {
            PaymentUpdateOutcome::Applied(order) => {
                info!("🔁️ Order {order_id} reconciled to {} (payment {}).", order.status, payment.id);
                Ok(ReconciliationOutcome::Updated(order))
            },
            PaymentUpdateOutcome::Forbidden { current } => {
                warn!(
                    "🔁️ Conflict on order {order_id}: stale delivery tried to move {current} -> {new_status}. \
                     The order keeps its {current} status."
                );
                Ok(ReconciliationOutcome::Conflict { order_id, current, incoming: new_status })
            },
            PaymentUpdateOutcome::NotFound => {
                // The order vanished between the fetch and the update. Treat like an unknown reference.
                warn!("🔁️ Order {order_id} disappeared while reconciling payment {}.", payment.id);
                Ok(ReconciliationOutcome::OrderNotFound { reference })
            },
        }
    }

    /// Fetch the authoritative payment resource, trying the owning vendor's credentials first and the
    /// application-level token second. `None` means every strategy failed — which is not an error here.
    async fn resolve_payment(
        &self,
        payment_id: Option<&str>,
        external_reference: Option<&str>,
    ) -> Result<Option<PaymentRecord>, ReconciliationError> {
        let Some(payment_id) = payment_id else {
            return Ok(None);
        };
        if let Some(reference) = external_reference {
            if let Ok(order_id) = reference.parse::<OrderId>() {
                if let Some(order) = self.db().fetch_order(order_id).await? {
                    match self.credentials.get_valid_access_token(order.vendor_id).await {
                        Ok(token) => match self.credentials.provider().fetch_payment(payment_id, &token).await {
                            Ok(payment) => return Ok(Some(payment)),
                            Err(e) => {
                                warn!(
                                    "🔁️ Vendor-scoped payment fetch failed for payment {payment_id} (vendor {}): \
                                     {e}. Falling back to the application token.",
                                    order.vendor_id
                                );
                            },
                        },
                        Err(e) => {
                            warn!(
                                "🔁️ No usable token for vendor {}: {e}. Falling back to the application token.",
                                order.vendor_id
                            );
                        },
                    }
                } else {
                    debug!("🔁️ Notification reference {reference:?} did not map to an order.");
                }
            }
        }
        if let Some(token) = &self.fallback_token {
            match self.credentials.provider().fetch_payment(payment_id, token.reveal()).await {
                Ok(payment) => return Ok(Some(payment)),
                Err(e) => {
                    error!("🔁️ Could not fetch payment {payment_id} with the application token either: {e}.");
                },
            }
        }
        Ok(None)
    }
}
