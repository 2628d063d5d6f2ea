//! Fixed-point money
//!
//! CRITICAL: All money values are i64 (cents). No floating-point value ever
//! crosses the ledger boundary — multiplication (hours x rate, percentage x
//! amount) is quantised to 2 digits (HALF_UP) immediately, addition and
//! subtraction on cents are exact.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// An amount of money with exactly two fractional digits, stored as whole
/// cents in a single platform currency.
///
/// # Example
/// ```
/// use extrashifty_engine::money::Money;
///
/// let rate = Money::from_cents(2000); // $20.00 / hour
/// let hours = 5.0;
/// let gross = rate.mul_f64_round(hours);
/// assert_eq!(gross, Money::from_cents(10000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Parse a dollars amount, e.g. `Money::from_dollars(12.5)` -> $12.50.
    pub fn from_dollars(dollars: f64) -> Self {
        Self(round_half_up(dollars * 100.0))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs(&self) -> Money {
        Money(self.0.abs())
    }

    pub fn max(self, other: Money) -> Money {
        Money(self.0.max(other.0))
    }

    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Multiply by an f64 factor (hours, a percentage, …) and round the
    /// result HALF_UP to the nearest cent. The only point where a float is
    /// allowed to touch a `Money` value — the result is quantised
    /// immediately, so no float ever flows further than this call.
    pub fn mul_f64_round(&self, factor: f64) -> Money {
        Money(round_half_up(self.0 as f64 * factor))
    }

    /// `self * pct / 100`, rounded HALF_UP. Used for commission and penalty
    /// percentages (e.g. `gross.percent_round(15.0)` for the 15% platform
    /// fee).
    pub fn percent_round(&self, pct: f64) -> Money {
        self.mul_f64_round(pct / 100.0)
    }

    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

fn round_half_up(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5).floor() as i64
    } else {
        (value - 0.5).ceil() as i64
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_up_rounds_half_away_from_zero() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.4), 2);
        assert_eq!(round_half_up(-2.5), -3);
    }

    #[test]
    fn percent_round_matches_commission_example() {
        let gross = Money::from_cents(10_000); // $100.00
        let commission = gross.percent_round(15.0);
        assert_eq!(commission, Money::from_cents(1_500));
        assert_eq!(gross - commission, Money::from_cents(8_500));
    }

    #[test]
    fn display_formats_dollars_and_cents() {
        assert_eq!(Money::from_cents(10_050).to_string(), "100.50");
        assert_eq!(Money::from_cents(-500).to_string(), "-5.00");
    }

    #[test]
    fn mul_f64_round_handles_fractional_hours() {
        let rate = Money::from_cents(2_000);
        assert_eq!(rate.mul_f64_round(5.0), Money::from_cents(10_000));
        assert_eq!(rate.mul_f64_round(2.5), Money::from_cents(5_000));
    }
}
