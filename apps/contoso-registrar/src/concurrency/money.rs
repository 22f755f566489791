//! Monetary amounts held in whole cents

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount of money rounded to the cent
///
/// Rounding happens once, when the amount is built, so two amounts compare
/// equal exactly when they agree to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid monetary amount: {0:?}")]
pub struct MoneyParseError(String);

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Whole currency units, e.g. dollars
    pub fn from_units(units: i64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    pub fn cents(self) -> i64 {
        self.cents
    }

    pub fn is_negative(self) -> bool {
        self.cents < 0
    }

    /// `$1,234.50`, `-$5.00`
    pub fn format(self, symbol: &str) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!(
            "{}{}{}.{:02}",
            sign,
            symbol,
            group_thousands(abs / 100),
            abs % 100
        )
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(""))
    }
}

/// Remove thousands separators; commas must split the digits into a leading
/// group of one to three followed by groups of exactly three.
fn strip_thousands(whole: &str) -> Option<String> {
    if !whole.contains(',') {
        return Some(whole.to_string());
    }

    let mut groups = whole.split(',');
    let lead = groups.next()?;
    if !(1..=3).contains(&lead.len()) {
        return None;
    }
    let mut digits = lead.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

/// Parses decimal text such as `1,234.505` or `-12.3`, rounding half away
/// from zero to the cent.
impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoneyParseError(s.to_string());
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };
        let whole = strip_thousands(whole).ok_or_else(err)?;
        if whole.is_empty() && fraction.is_empty() {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        let units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };

        let mut fraction_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = fraction_digits.next().unwrap_or(0);
        let hundredths = fraction_digits.next().unwrap_or(0);
        let round_up = fraction_digits.next().map(|d| d >= 5).unwrap_or(false);

        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(err)?;

        Ok(Money {
            cents: if negative { -cents } else { cents },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_rounds_to_cents() {
        assert_eq!(parse("100").cents(), 10_000);
        assert_eq!(parse("100.5").cents(), 10_050);
        assert_eq!(parse("100.004").cents(), 10_000);
        assert_eq!(parse("100.005").cents(), 10_001);
        assert_eq!(parse("-0.125").cents(), -13);
        assert_eq!(parse("1,234.56").cents(), 123_456);
        assert_eq!(parse("12,345,678").cents(), 1_234_567_800);
        assert_eq!(parse(".75").cents(), 75);
    }

    #[test]
    fn test_equal_after_rounding() {
        assert_eq!(parse("350000.001"), parse("350000"));
        assert_ne!(parse("350000.01"), parse("350000"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "-", "abc", "1.2.3", "$5", "1e3", "1,2,3", ",,,5", "1234,567", "1,23", ",500"] {
            assert!(bad.parse::<Money>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(Money::from_units(100).format("$"), "$100.00");
        assert_eq!(Money::from_cents(123_456_789).format("$"), "$1,234,567.89");
        assert_eq!(Money::from_cents(-500).format("$"), "-$5.00");
        assert_eq!(Money::ZERO.format("€"), "€0.00");
        assert_eq!(Money::from_cents(99_900).to_string(), "999.00");
    }
}
