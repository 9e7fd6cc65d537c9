//! Fixed-point monetary amounts.
//!
//! Amounts are stored as `i64` cents end to end (wire, handler, database) to avoid
//! floating-point drift. Decimal text only appears at the edges: it is parsed when a
//! request is decoded and rendered when a report is built.
//!
//! For example:
//! - `"10.5"` parses to 1050 cents and renders as `10.50`
//! - `"100"` parses to 10000 cents and renders as `100.00`

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Errors produced while parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Text is not a plain decimal literal (e.g. `"abc"`, `"1e5"`, `""`).
    #[error("'{0}' is not a decimal amount")]
    Malformed(String),

    /// More than two fractional digits; cents are the smallest unit.
    #[error("'{0}' has more than two decimal places")]
    TooPrecise(String),

    /// Does not fit in an `i64` count of cents.
    #[error("'{0}' is out of range")]
    OutOfRange(String),
}

/// A signed amount of money in cents.
///
/// Deltas applied to a balance may be negative; amounts carried by requests and
/// transaction records are validated to be positive before they reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// The delta that undoes `self` when applied to a balance.
    pub fn negated(self) -> Money {
        Money(-self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str_exact(s.trim())
            .map_err(|_| MoneyError::Malformed(s.to_string()))?
            .normalize();

        if decimal.scale() > 2 {
            return Err(MoneyError::TooPrecise(s.to_string()));
        }

        decimal
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Money)
            .ok_or_else(|| MoneyError::OutOfRange(s.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
