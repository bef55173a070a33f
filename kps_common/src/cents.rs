use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

//--------------------------------------        Cents       ----------------------------------------------------------
/// A monetary amount in minor currency units (cents).
///
/// All prices and totals in the payment engine are carried and persisted as integer cents. Client-facing JSON uses
/// decimal major units; [`Cents::from_major_units`] rounds to the nearest cent on the way in.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CentsConversionError(format!("{value} is not a finite amount")));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to cents")))
        } else {
            #[allow(clippy::cast_possible_truncation)]
            Ok(Self(cents as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let major = self.0 as f64 / 100.0;
        write!(f, "{major:0.2}")
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Rounds to the nearest cent. See [`TryFrom<f64>`] for the checked version.
    pub fn from_major_units_f64(units: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self((units * 100.0).round() as i64)
    }

    /// The amount formatted as a decimal major-unit string with two decimals, e.g. `"37.00"`.
    pub fn to_major_string(&self) -> String {
        format!("{:0.2}", self.0 as f64 / 100.0)
    }

    /// The amount rounded to the nearest whole major unit. Daraja only accepts whole-unit amounts.
    pub fn to_whole_major_units(&self) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let units = (self.0 as f64 / 100.0).round() as i64;
        units
    }

    /// True iff the difference between the two amounts is at most one cent.
    pub fn within_one_cent(&self, other: Cents) -> bool {
        (self.0 - other.0).abs() <= 1
    }
}
