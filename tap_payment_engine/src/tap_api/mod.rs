//! # The payment engine public API.
//!
//! These are the service objects the server injects into its route handlers. Each one is generic over the
//! storage traits (and, where it talks to the provider, over [`crate::traits::PaymentProvider`]) so that
//! endpoint tests can run against mocks and the production wiring can pass the SQLite backend and the
//! real client.
//!
//! * [`VendorApi`] — vendor lookups and ownership checks.
//! * [`CredentialApi`] — the token store/refresh service ("give me a valid access token for this vendor").
//! * [`LinkFlowApi`] — completes the OAuth linking flow after the provider redirects back.
//! * [`ReconciliationApi`] — maps asynchronous payment notifications onto order state.
//! * [`CheckoutApi`] — opens provider checkout sessions for orders.

pub mod credential_api;
pub mod errors;
pub mod link_flow_api;
pub mod reconciliation_api;
pub mod vendor_api;

pub mod checkout_api;

pub use checkout_api::{CheckoutApi, CheckoutSettings};
pub use credential_api::CredentialApi;
pub use link_flow_api::LinkFlowApi;
pub use reconciliation_api::{PaymentNotice, ReconciliationApi, ReconciliationOutcome};
pub use vendor_api::VendorApi;
