//! Prices in Brazilian reais.
//!
//! Amounts are kept as [`Decimal`] so sale prices in the millions never
//! lose cents to floating point.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount in BRL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// The raw amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is zero (listed as "price on request").
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse an amount the way people type it in Brazil.
    ///
    /// Accepts `450000`, `450.000`, `R$ 450.000,00` and `1.500,5`. Dots are
    /// thousands separators and the comma is the decimal mark. Returns `None`
    /// for empty, negative or unparseable input.
    #[must_use]
    pub fn parse_brl(input: &str) -> Option<Self> {
        let cleaned: String = input
            .trim()
            .trim_start_matches("R$")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        let amount = Decimal::from_str(&cleaned).ok()?;
        if amount.is_sign_negative() {
            return None;
        }
        Some(Self(amount))
    }

    /// Format for display: `R$ 1.250.000` for whole amounts, `R$ 2.500,50`
    /// otherwise.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self.0.round_dp(2);
        let text = format!("{rounded:.2}");
        let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));
        let (sign, digits) = int_part
            .strip_prefix('-')
            .map_or(("", int_part), |rest| ("-", rest));

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        if frac_part == "00" {
            format!("{sign}R$ {grouped}")
        } else {
            format!("{sign}R$ {grouped},{frac_part}")
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(price("1250000").display(), "R$ 1.250.000");
        assert_eq!(price("950").display(), "R$ 950");
        assert_eq!(price("2500.5").display(), "R$ 2.500,50");
        assert_eq!(price("0").display(), "R$ 0");
    }

    #[test]
    fn test_parse_brl_formats() {
        assert_eq!(Price::parse_brl("450000"), Some(price("450000")));
        assert_eq!(Price::parse_brl("450.000"), Some(price("450000")));
        assert_eq!(Price::parse_brl("R$ 1.500,50"), Some(price("1500.50")));
        assert_eq!(Price::parse_brl(""), None);
        assert_eq!(Price::parse_brl("abc"), None);
        assert_eq!(Price::parse_brl("-10"), None);
    }
}
