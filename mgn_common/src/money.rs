use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Money         ---------------------------------------------------------

/// A fixed-point monetary amount, stored as a signed count of minor units (cents).
///
/// Catalog prices, frozen order-item prices, order totals and transaction amounts all use this type, so the
/// "two amounts agree" checks throughout the engine are exact integer comparisons at cent resolution. Amounts
/// serialize as 2-decimal strings (`"12.34"`) and deserialize from either a JSON number or a string, since the
/// storefront client sends both.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a plain decimal string (`"10"`, `"10.5"`, `"10.50"`, `"-0.99"`). More than two fractional digits
    /// are rounded half-up at the cent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        if digits.is_empty() {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|e| MoneyConversionError(e.to_string()))? };
        let mut cents = frac.bytes().take(2).fold(0i64, |acc, d| acc * 10 + i64::from(d - b'0'));
        if frac.len() == 1 {
            cents *= 10;
        }
        if frac.len() > 2 && frac.as_bytes()[2] >= b'5' {
            cents += 1;
        }
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .and_then(|v| v.checked_mul(sign))
            .map(Self)
            .ok_or_else(|| MoneyConversionError(format!("'{s}' overflows the representable range")))
    }
}

impl Serialize for Money {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawMoney {
            Int(i64),
            Float(f64),
            Text(String),
        }
        match RawMoney::deserialize(deserializer)? {
            RawMoney::Int(units) => units
                .checked_mul(100)
                .map(Money)
                .ok_or_else(|| serde::de::Error::custom(format!("{units} overflows the representable range"))),
            RawMoney::Float(value) => {
                if !value.is_finite() || value.abs() > (i64::MAX / 100) as f64 {
                    return Err(serde::de::Error::custom(format!("{value} is not a representable amount")));
                }
                #[allow(clippy::cast_possible_truncation)]
                Ok(Money((value * 100.0).round() as i64))
            }
            RawMoney::Text(s) => Money::from_str(&s).map_err(serde::de::Error::custom),
        }
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// `units` whole major units, e.g. `from_units(10)` is 10.00.
    pub fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// The line total for `quantity` items at this unit price, or `None` on overflow.
    pub fn checked_line_total(&self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}
