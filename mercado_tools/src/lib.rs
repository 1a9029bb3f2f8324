//! A thin, typed client for the Mercado Pago REST API.
//!
//! This crate knows nothing about vendors, orders or databases. It covers exactly the slice of the provider
//! API that the payment server needs:
//! * the OAuth token endpoint (`authorization_code` and `refresh_token` grants),
//! * payment lookup (`GET /v1/payments/{id}`),
//! * checkout preference creation (`POST /checkout/preferences`).
//!
//! Every outbound call runs with a bounded timeout; the token endpoint is form-encoded, everything else is
//! JSON, as the provider requires.

mod api;
mod config;
mod error;

mod data_objects;

pub use api::MercadoApi;
pub use config::MercadoConfig;
pub use data_objects::{
    NewPreference,
    PaymentResponse,
    PreferenceBackUrls,
    PreferenceItem,
    PreferencePayer,
    PreferenceResponse,
    TokenResponse,
};
pub use error::MercadoApiError;
