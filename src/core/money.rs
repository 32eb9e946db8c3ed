//! Exact money amounts.
//!
//! `Money` wraps a `rust_decimal::Decimal` limited to two fractional digits. Storage
//! uses integer minor units (cents) so that balance arithmetic inside `SQLite` never
//! goes through a floating point value.

use crate::errors::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional digits carried by every amount.
pub const MONEY_SCALE: u32 = 2;

const MINOR_PER_UNIT: i64 = 100;

/// A signed, exact monetary value with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Zero, the additive identity.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wraps a decimal, rejecting values with more than two fractional digits.
    pub fn new(value: Decimal) -> Result<Self> {
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(Error::invalid(format!(
                "amount {value} has more than {MONEY_SCALE} decimal places"
            )));
        }
        Ok(Self(normalized))
    }

    /// Builds an amount from integer minor units (cents).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, MONEY_SCALE))
    }

    /// Converts to integer minor units for storage.
    pub fn to_minor(self) -> Result<i64> {
        self.0
            .checked_mul(Decimal::from(MINOR_PER_UNIT))
            .and_then(|minor| minor.to_i64())
            .ok_or_else(|| Error::invalid(format!("amount {self} is out of range")))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `self / total * 100`, or zero when `total` is zero. Not rounded.
    #[must_use]
    pub fn percent_of(self, total: Self) -> Decimal {
        if total.is_zero() {
            return Decimal::ZERO;
        }
        self.0 / total.0 * Decimal::ONE_HUNDRED
    }
}

/// Rounds a percentage for display, half away from zero.
#[must_use]
pub fn round_percent(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| Error::invalid(format!("malformed amount '{s}': {e}")))?;
        Self::new(value)
    }
}

impl TryFrom<String> for Money {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
