//! Stake amounts.
//!
//! Amounts are represented as fixed-point integers (u128) to avoid floating-point errors.
//! The smallest unit is 1 raw; one whole token is `10^18` raw, so `"0.5"` is
//! `500_000_000_000_000_000` raw.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Number of decimal places in one whole token.
pub const DECIMALS: u32 = 18;

/// Raw units in one whole token.
pub const UNIT: u128 = 10u128.pow(DECIMALS);

/// An amount of the single pool asset, in raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// A whole number of tokens, or `None` if it overflows.
    pub fn from_whole(tokens: u128) -> Option<Self> {
        tokens.checked_mul(UNIT).map(Self)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(u128::from(factor)).map(Self)
    }

    /// Sum of `amounts`, or `None` if it overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Option<Self> {
        amounts.into_iter().try_fold(Self::ZERO, Self::checked_add)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Integer division into `parts` equal shares plus the remainder.
    ///
    /// Returns `None` when `parts` is zero.
    pub fn split(self, parts: u64) -> Option<(Self, Self)> {
        if parts == 0 {
            return None;
        }
        let parts = u128::from(parts);
        Some((Self(self.0 / parts), Self(self.0 % parts)))
    }

    /// Parse a decimal token string such as `"1"`, `"0.5"` or `"12.000000000000000001"`.
    pub fn parse_decimal(s: &str) -> Result<Self, TypesError> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(TypesError::InvalidAmount(s.to_string()));
        }
        if frac.len() > DECIMALS as usize {
            return Err(TypesError::TooManyDecimals {
                value: s.to_string(),
                max: DECIMALS,
            });
        }

        let overflow = || TypesError::AmountOverflow(s.to_string());
        let whole_raw = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };
        let frac_raw = if frac.is_empty() {
            0
        } else {
            // Right-pad to 18 digits: "5" -> 500_000_000_000_000_000.
            let scale = 10u128.pow(DECIMALS - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| overflow())? * scale
        };

        whole_raw
            .checked_mul(UNIT)
            .and_then(|w| w.checked_add(frac_raw))
            .map(Self)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    /// Decimal token notation without trailing zeros: `1`, `0.5`, `3.000000000000000001`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_tokens() {
        assert_eq!(Amount::parse_decimal("1").unwrap().raw(), UNIT);
        assert_eq!(Amount::parse_decimal("1.0").unwrap().raw(), UNIT);
        assert_eq!(Amount::parse_decimal("0.5").unwrap().raw(), UNIT / 2);
        assert_eq!(Amount::parse_decimal(".25").unwrap().raw(), UNIT / 4);
        assert_eq!(Amount::parse_decimal("0.000000000000000001").unwrap().raw(), 1);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", ".", "-1", "+1", "1.2.3", "1e18", "abc", " 1 2"] {
            assert!(Amount::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
        assert!(matches!(
            Amount::parse_decimal("0.0000000000000000001"),
            Err(TypesError::TooManyDecimals { .. })
        ));
        assert!(matches!(
            Amount::parse_decimal("999999999999999999999999999999"),
            Err(TypesError::AmountOverflow(_))
        ));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::new(UNIT).to_string(), "1");
        assert_eq!(Amount::new(UNIT * 3 / 2).to_string(), "1.5");
        assert_eq!(Amount::new(UNIT + 1).to_string(), "1.000000000000000001");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(
            Amount::checked_sum([Amount::new(1), Amount::new(2), Amount::new(3)]),
            Some(Amount::new(6))
        );
        assert_eq!(Amount::checked_sum([]), Some(Amount::ZERO));
        assert_eq!(Amount::checked_sum([Amount::new(u128::MAX), Amount::new(1)]), None);
    }

    #[test]
    fn split_returns_share_and_remainder() {
        let (share, rem) = Amount::new(10).split(3).unwrap();
        assert_eq!(share, Amount::new(3));
        assert_eq!(rem, Amount::new(1));
        assert!(Amount::new(10).split(0).is_none());
    }
}
