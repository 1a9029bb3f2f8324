use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// Orders are priced in Argentine pesos unless the storefront says otherwise.
pub const DEFAULT_CURRENCY_CODE: &str = "ARS";

//--------------------------------------      Cents       ------------------------------------------------------------
/// A monetary amount in minor units (cents). All prices and fees in the system are integer cents; fractional
/// amounts only ever appear at the provider boundary, where they are converted explicitly.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The amount as major units (e.g. pesos), for provider APIs that take decimal amounts.
    pub fn to_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// An integer percentage of this amount, rounded to the nearest cent.
    pub fn percentage(&self, percent: u8) -> Cents {
        let value = (self.0 as f64 * f64::from(percent) / 100.0).round() as i64;
        Cents(value)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to cents")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Cents {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:0.2}", self.to_major_units())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn percentage_rounds_to_nearest_cent() {
        assert_eq!(Cents::from(1000).percentage(10), Cents::from(100));
        assert_eq!(Cents::from(999).percentage(10), Cents::from(100));
        assert_eq!(Cents::from(994).percentage(10), Cents::from(99));
        assert_eq!(Cents::from(0).percentage(10), Cents::from(0));
    }

    #[test]
    fn display_uses_major_units() {
        assert_eq!(Cents::from(123456).to_string(), "$1234.56");
    }
}
