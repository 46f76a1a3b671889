//! # Money Module
//!
//! Provides the `Money` type for prices, subtotals and order totals.
//!
//! ## Why Integer Minor Units?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Storefront JSON carries prices as major units: "price": 10.99         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │    10.99 * 3 = 32.97000000000001    ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: parse the decimal TEXT straight into minor units         │
//! │    "10.99" ──► 1099                                                     │
//! │    1099 * 3 = 3297 ──► "32.97"                                          │
//! │                                                                         │
//! │  The payment provider also speaks minor units (amount_total: 3297).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use treido_core::money::Money;
//!
//! let price = Money::parse_major("10.99").unwrap();
//! assert_eq!(price.minor(), 1099);
//! assert_eq!((price * 3).to_string(), "32.97");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (stotinki / cents).
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  products.price_cents ──► ProductCard.price ──► CartItem.price          │
/// │                                                     │                   │
/// │                                 Cart::subtotal ◄────┤                   │
/// │                                                     ▼                   │
/// │                          SessionItem.price ──► line_items unit_amount   │
/// │                                                                         │
/// │  amount_total (provider) ──► orders.total_cents ──► VerifyOutcome       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Whole major units (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// The minor-unit remainder, always positive.
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    #[inline]
    pub fn checked_mul(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Major units as a float. For JSON output only, never for arithmetic.
    #[inline]
    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parses a decimal string in major units into minor units.
    ///
    /// ## Rules
    /// - Optional sign, digits, optional `.` and fraction: `"10"`, `"10.5"`, `".5"`, `"5."`
    /// - A third fractional digit rounds half up: `"1.005"` → 101
    /// - Anything else (`""`, `"abc"`, `"1e3"`, overflow) → `None`
    ///
    /// ```rust
    /// use treido_core::money::Money;
    ///
    /// assert_eq!(Money::parse_major("10.5").unwrap().minor(), 1050);
    /// assert_eq!(Money::parse_major(" 3 ").unwrap().minor(), 300);
    /// assert!(Money::parse_major("ten").is_none());
    /// ```
    pub fn parse_major(input: &str) -> Option<Money> {
        let s = input.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

        let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tens = frac_digits.next().unwrap_or(0);
        let ones = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().map(|d| d >= 5).unwrap_or(false);

        let mut minor = whole_value.checked_mul(100)?.checked_add(tens * 10 + ones)?;
        if round_up {
            minor = minor.checked_add(1)?;
        }

        Some(Money(if negative { -minor } else { minor }))
    }

    /// Reads a major-unit amount from loosely typed JSON.
    ///
    /// Accepts JSON numbers and numeric strings, the two shapes a persisted
    /// storefront cart can contain. Floats are rendered back to their
    /// shortest decimal text before parsing so `10.99` stays `1099`.
    pub fn from_json_major(value: &Value) -> Option<Money> {
        match value {
            Value::Number(n) => {
                if let Some(whole) = n.as_i64() {
                    whole.checked_mul(100).map(Money)
                } else if n.as_u64().is_some() {
                    None
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite())
                        .and_then(|f| Money::parse_major(&f.to_string()))
                }
            }
            Value::String(s) => Money::parse_major(s).or_else(|| {
                s.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(|f| Money::parse_major(&f.to_string()))
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Major-unit serde adapter
// =============================================================================

/// Serde adapter writing money as a major-unit JSON number (`10.99`).
///
/// Used on every field the storefront reads as a plain number: cart lines,
/// product cards and checkout session items.
///
/// ```rust,ignore
/// #[serde(with = "crate::money::major_units")]
/// pub price: Money,
/// ```
pub mod major_units {
    use super::Money;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        if money.0 % 100 == 0 {
            serializer.serialize_i64(money.0 / 100)
        } else {
            serializer.serialize_f64(money.to_major_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Money::from_json_major(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid amount: {}", value)))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders `12.50` / `-0.05`. Currency symbols are a storefront concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

/// Saturates at the `i64` bounds; use [`Money::checked_mul`] to detect overflow.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
