//! Tap Payment Engine
//!
//! The Tap Payment Engine is the core of the marketplace's payment integration: it links vendors to their
//! payment-provider merchant accounts over OAuth, keeps those credentials fresh, and reconciles
//! asynchronous payment notifications onto order state. The library is HTTP-framework-agnostic; the Tap
//! Payment Server wires it into actix-web.
//!
//! The library is divided into three main sections:
//! 1. The trait seams ([`mod@traits`]). Storage is reached through three narrow capability traits, and the
//!    payment provider through [`traits::PaymentProvider`]; there are no ambient singletons. The SQLite
//!    backend ([`SqliteDatabase`]) implements the storage traits.
//! 2. The public service APIs ([`mod@tap_api`], re-exported at the crate root): [`CredentialApi`],
//!    [`LinkFlowApi`], [`ReconciliationApi`], [`CheckoutApi`] and [`VendorApi`].
//! 3. Helpers ([`mod@helpers`]), most notably the signed OAuth state-token codec.

pub mod db_types;
pub mod helpers;
pub mod tap_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use tap_api::{
    errors::{CheckoutApiError, LinkApiError, LinkFlowError, ReconciliationError},
    CheckoutApi,
    CheckoutSettings,
    CredentialApi,
    LinkFlowApi,
    PaymentNotice,
    ReconciliationApi,
    ReconciliationOutcome,
    VendorApi,
};
