//! Fixed-point EUR amounts, stored as a signed count of cents.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount '{0}' is too short, expected at least three characters")]
    TooShort(String),
    #[error("amount '{0}' contains characters other than digits and separators")]
    InvalidCharacter(String),
    #[error("amount '{0}' does not fit into 64 bits")]
    Overflow(String),
}

/// Decimal separator used when rendering an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Period,
}

impl Separator {
    fn as_char(self) -> char {
        match self {
            Separator::Comma => ',',
            Separator::Period => '.',
        }
    }
}

/// A monetary value with exactly two decimal digits.
///
/// Parsing is deliberately literal: every `,` and `.` is dropped and the
/// remaining digits are read as cents, so `"1.234,56"` is 1234,56 and
/// `"500"` is 5,00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    cents: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount { cents: 0 };

    /// Whole currency units, no cents. Saturates at the `i64` cent range;
    /// use [`Amount::checked_from_whole`] for untrusted input.
    pub fn from_whole(units: i64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    pub fn checked_from_whole(units: i64) -> Option<Self> {
        units.checked_mul(100).map(|cents| Self { cents })
    }

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    pub fn format(&self, separator: Separator) -> String {
        let magnitude = self.cents.unsigned_abs();
        let sign = if self.is_negative() { "-" } else { "" };
        format!(
            "{sign}{}{}{:02}",
            magnitude / 100,
            separator.as_char(),
            magnitude % 100
        )
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.cents.checked_add(other.cents).map(Amount::from_cents)
    }

    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        self.cents.checked_sub(other.cents).map(Amount::from_cents)
    }

    /// Strictly greater: an amount never covers itself.
    pub fn covers(&self, other: &Amount) -> bool {
        self.cents > other.cents
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.chars().count() < 3 {
            return Err(AmountError::TooShort(s.to_owned()));
        }

        let (negative, body) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let mut cents: i64 = 0;
        let mut seen_digit = false;
        for c in body.chars() {
            match c {
                ',' | '.' => continue,
                '0'..='9' => {
                    seen_digit = true;
                    cents = cents
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(c as u8 - b'0')))
                        .ok_or_else(|| AmountError::Overflow(s.to_owned()))?;
                }
                _ => return Err(AmountError::InvalidCharacter(s.to_owned())),
            }
        }
        if !seen_digit {
            return Err(AmountError::InvalidCharacter(s.to_owned()));
        }

        Ok(Self {
            cents: if negative { -cents } else { cents },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(Separator::Comma))
    }
}
