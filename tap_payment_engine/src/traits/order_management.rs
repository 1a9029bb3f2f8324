use crate::{
    db_types::{Order, OrderId, OrderPaymentUpdate},
    traits::{data_objects::PaymentUpdateOutcome, StorageError},
};

/// Read and reconcile orders. Order creation, line items and fulfilment belong to the surrounding
/// marketplace; this trait only covers what payment reconciliation needs.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StorageError>;

    /// Apply a reconciliation write. The implementation MUST be a single conditional update that only
    /// succeeds when [`OrderStatusType::may_transition_to`](crate::db_types::OrderStatusType) permits the
    /// transition, so that duplicate and out-of-order deliveries converge instead of racing.
    async fn apply_payment_update(
        &self,
        id: OrderId,
        update: OrderPaymentUpdate,
    ) -> Result<PaymentUpdateOutcome, StorageError>;

    /// Record the checkout preference id once a checkout session has been opened for the order.
    async fn set_preference_id(&self, id: OrderId, preference_id: &str) -> Result<(), StorageError>;
}
