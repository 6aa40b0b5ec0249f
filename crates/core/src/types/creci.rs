//! CRECI (broker license) and CEP (postal code) identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Creci`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CreciError {
    #[error("CRECI cannot be empty")]
    Empty,
    #[error("CRECI must contain a registration number")]
    MissingNumber,
    #[error("CRECI contains invalid characters")]
    InvalidCharacters,
    #[error("CRECI must be at most {max} characters")]
    TooLong { max: usize },
}

/// A broker's CRECI registration, e.g. `12345-F` or `CRECI/SP 12345-J`.
///
/// Regional councils format the number differently, so validation is
/// loose: it must carry digits and may only use letters,
/// digits, spaces, `/`, `-` and `.`. The value is uppercased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Creci(String);

impl Creci {
    pub const MAX_LENGTH: usize = 32;

    /// Parse a CRECI from user input.
    ///
    /// # Errors
    ///
    /// Returns a [`CreciError`] if the input is empty, too long, has no
    /// digits or contains unexpected characters.
    pub fn parse(s: &str) -> Result<Self, CreciError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CreciError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CreciError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '/' | '-' | '.'))
        {
            return Err(CreciError::InvalidCharacters);
        }
        if !s.chars().any(|c| c.is_ascii_digit()) {
            return Err(CreciError::MissingNumber);
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Creci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur when parsing a [`Cep`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CepError {
    #[error("CEP cannot be empty")]
    Empty,
    #[error("CEP must have 8 digits")]
    InvalidFormat,
}

/// Brazilian postal code, stored as 8 digits.
///
/// ```
/// use morada_core::Cep;
///
/// assert_eq!(Cep::parse("01310-100").unwrap().formatted(), "01310-100");
/// assert!(Cep::parse("1310-100").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cep(String);

impl Cep {
    /// Parse a CEP, accepting `01310-100`, `01310100` or `01.310-100`.
    ///
    /// # Errors
    ///
    /// Returns a [`CepError`] if the input does not reduce to 8 digits.
    pub fn parse(s: &str) -> Result<Self, CepError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CepError::Empty);
        }
        if !s.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.') {
            return Err(CepError::InvalidFormat);
        }
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 8 {
            return Err(CepError::InvalidFormat);
        }
        Ok(Self(digits))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `01310-100`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let (head, tail) = self.0.split_at(5);
        format!("{head}-{tail}")
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_creci_accepts_regional_formats() {
        assert_eq!(Creci::parse("12345-f").unwrap().as_str(), "12345-F");
        assert_eq!(
            Creci::parse(" CRECI/SP 123456-J ").unwrap().as_str(),
            "CRECI/SP 123456-J"
        );
    }

    #[test]
    fn test_creci_rejects_bad_input() {
        assert_eq!(Creci::parse(""), Err(CreciError::Empty));
        assert_eq!(Creci::parse("CRECI"), Err(CreciError::MissingNumber));
        assert_eq!(Creci::parse("123#45"), Err(CreciError::InvalidCharacters));
        assert!(matches!(
            Creci::parse(&"1".repeat(40)),
            Err(CreciError::TooLong { .. })
        ));
    }

    #[test]
    fn test_cep() {
        assert_eq!(Cep::parse("01.310-100").unwrap().as_str(), "01310100");
        assert_eq!(Cep::parse("01310100").unwrap().to_string(), "01310-100");
        assert_eq!(Cep::parse(""), Err(CepError::Empty));
        assert_eq!(Cep::parse("0131010"), Err(CepError::InvalidFormat));
        assert_eq!(Cep::parse("0131O-100"), Err(CepError::InvalidFormat));
    }
}
