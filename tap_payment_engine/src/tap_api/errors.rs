use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{ProviderError, StorageError},
};

//--------------------------------------     LinkApiError      -------------------------------------------------------
/// Failures of the token store/refresh service. Callers must handle each variant; in particular,
/// `NotLinked` and `RefreshFailed` on a user-facing path mean "payments unavailable", never a bare 500.
#[derive(Debug, Clone, Error)]
pub enum LinkApiError {
    #[error("No payment provider account is linked to vendor {0}")]
    NotLinked(i64),
    #[error("Could not refresh the merchant access token. {0}")]
    RefreshFailed(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StorageError> for LinkApiError {
    fn from(e: StorageError) -> Self {
        LinkApiError::DatabaseError(e.to_string())
    }
}

//--------------------------------------     LinkFlowError     -------------------------------------------------------
/// Failures of the OAuth callback's code exchange and link persistence.
#[derive(Debug, Clone, Error)]
pub enum LinkFlowError {
    #[error("The provider rejected the code exchange with status {status}. {body}")]
    ExchangeRejected { status: u16, body: String },
    #[error("Could not reach the provider. {0}")]
    ProviderUnreachable(String),
    #[error("The token response did not include a merchant account id")]
    MissingMerchantId,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ProviderError> for LinkFlowError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Rejected { status, body } => LinkFlowError::ExchangeRejected { status, body },
            ProviderError::Unreachable(msg) => LinkFlowError::ProviderUnreachable(msg),
        }
    }
}

impl From<StorageError> for LinkFlowError {
    fn from(e: StorageError) -> Self {
        LinkFlowError::DatabaseError(e.to_string())
    }
}

//--------------------------------------  ReconciliationError  -------------------------------------------------------
/// The only *errors* reconciliation can produce are internal ones (the database is down). Everything the
/// outside world can throw at the webhook — junk payloads, unknown payments, stale statuses — is a normal
/// [`ReconciliationOutcome`](crate::tap_api::ReconciliationOutcome), not an error, because the provider
/// must not be goaded into retry storms over noise.
#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StorageError> for ReconciliationError {
    fn from(e: StorageError) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}

//--------------------------------------   CheckoutApiError    -------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum CheckoutApiError {
    /// Also returned when the order exists but belongs to a different buyer; callers must not be able to
    /// probe other people's orders.
    #[error("Order {0} was not found")]
    OrderNotFound(OrderId),
    #[error("Payments are unavailable for this vendor. {0}")]
    PaymentUnavailable(String),
    #[error("Could not create the checkout session. {0}")]
    ProviderError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StorageError> for CheckoutApiError {
    fn from(e: StorageError) -> Self {
        CheckoutApiError::DatabaseError(e.to_string())
    }
}
