use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An amount of money in minor units (cents). Prices are never stored as floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Highest unit price a product may carry (ten million in major units).
    pub const MAX_PRICE: Money = Money(1_000_000_000);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Multiply a unit price by a quantity.
    pub fn times(self, quantity: u32) -> Result<Self> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or_else(out_of_range)
    }

    pub fn checked_add(self, other: Money) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(out_of_range)
    }

    /// Add up line totals, failing instead of wrapping.
    pub fn total<I: IntoIterator<Item = Money>>(amounts: I) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Parse a decimal amount such as `"12"`, `"12.5"` or `"12.50"`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('$');
        if trimmed.is_empty() {
            return Err(Error::Validation("price is required".into()));
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(format!("invalid price: {input}")));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(format!("invalid price: {input}")));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| Error::Validation(format!("price out of range: {input}")))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().unwrap_or(0) * 10,
            _ => frac.parse::<i64>().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(Self)
            .ok_or_else(|| Error::Validation(format!("price out of range: {input}")))
    }

    /// Render with a currency symbol, e.g. `$1,234.50`.
    pub fn display_with(self, symbol: &str) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = (abs / 100).to_string();

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!("{sign}{symbol}{grouped}.{:02}", abs % 100)
    }

    /// Plain decimal form used to pre-fill admin forms, e.g. `1234.50`.
    pub fn to_decimal_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_with("$"))
    }
}

fn out_of_range() -> Error {
    Error::Validation("amount is too large".into())
}
