//! # Database and provider seams.
//!
//! This module defines the interface contracts between the payment engine and its collaborators.
//!
//! ## Storage
//! The relational store is reached exclusively through three narrow capability traits, injected into the
//! service APIs — there are no ambient database singletons anywhere in the engine:
//!
//! * [`VendorManagement`] answers ownership questions about vendors.
//! * [`MerchantLinkManagement`] persists and rotates per-vendor provider credentials.
//! * [`OrderManagement`] reads orders and applies reconciliation writes. The status write is a single
//!   conditional update so concurrent duplicate deliveries cannot race each other into a lost update.
//!
//! ## Provider
//! [`PaymentProvider`] abstracts the payment provider's HTTP API (token grants, payment lookup, checkout
//! creation) so the engine can be exercised against mocks and the server can plug in the real client.

mod merchant_link_management;
mod order_management;
mod payment_provider;
mod vendor_management;

mod data_objects;

pub use data_objects::{CheckoutRequest, CheckoutSession, PaymentRecord, PaymentUpdateOutcome, TokenGrant};
pub use merchant_link_management::MerchantLinkManagement;
pub use order_management::OrderManagement;
pub use payment_provider::{PaymentProvider, ProviderError};
pub use vendor_management::VendorManagement;

use thiserror::Error;

/// Everything the reconciliation and checkout services need from storage, rolled into one bound so that
/// route registrations stay readable. Blanket-implemented; backends never implement it by hand.
pub trait PaymentStore: OrderManagement + MerchantLinkManagement {}

impl<T: OrderManagement + MerchantLinkManagement> PaymentStore for T {}

/// Errors surfaced by the storage traits. Backends map their native errors into this enum.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The record was not found. {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
