mod money;
mod secret;

pub mod helpers;

pub use money::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
