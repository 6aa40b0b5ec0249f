//! Brazilian phone numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// Nothing was typed.
    #[error("phone cannot be empty")]
    Empty,
    /// The input contains characters other than digits and common separators.
    #[error("phone contains invalid characters")]
    InvalidCharacters,
    /// The number of digits does not match a landline or mobile number.
    #[error("phone must have 10 or 11 digits including area code (got {0})")]
    InvalidLength(usize),
    /// Area code starting with zero.
    #[error("invalid area code")]
    InvalidAreaCode,
}

/// A Brazilian phone number with area code (DDD), stored as digits only.
///
/// Accepts the usual ways people type numbers: `(11) 98765-4321`,
/// `11987654321`, `+55 11 98765-4321`. The country code is stripped.
///
/// ```
/// use morada_core::Phone;
///
/// let phone = Phone::parse("+55 (11) 98765-4321").unwrap();
/// assert_eq!(phone.as_str(), "11987654321");
/// assert_eq!(phone.formatted(), "(11) 98765-4321");
/// assert_eq!(phone.e164(), "+5511987654321");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Parse a phone number from user input.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the input is empty, contains letters, or
    /// does not have 10 (landline) or 11 (mobile) digits after removing the
    /// optional `+55` prefix.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '(' | ')' | '-' | '+' | '.'))
        {
            return Err(PhoneError::InvalidCharacters);
        }

        let mut digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if (digits.len() == 12 || digits.len() == 13) && digits.starts_with("55") {
            digits.drain(..2);
        }

        if digits.len() != 10 && digits.len() != 11 {
            return Err(PhoneError::InvalidLength(digits.len()));
        }

        if digits.starts_with('0') {
            return Err(PhoneError::InvalidAreaCode);
        }

        Ok(Self(digits))
    }

    /// Digits only, area code first.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number in E.164 form, as the identity provider expects it.
    #[must_use]
    pub fn e164(&self) -> String {
        format!("+55{}", self.0)
    }

    /// Display form: `(11) 98765-4321` or `(11) 3456-7890`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let (area, rest) = self.0.split_at(2);
        let split = rest.len() - 4;
        let (head, tail) = rest.split_at(split);
        format!("({area}) {head}-{tail}")
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mobile_and_landline() {
        assert_eq!(Phone::parse("(11) 98765-4321").unwrap().as_str(), "11987654321");
        assert_eq!(Phone::parse("21 3456-7890").unwrap().as_str(), "2134567890");
    }

    #[test]
    fn test_parse_strips_country_code() {
        assert_eq!(Phone::parse("+55 11 98765 4321").unwrap().as_str(), "11987654321");
        assert_eq!(Phone::parse("552134567890").unwrap().as_str(), "2134567890");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("   "), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("11 9abc"), Err(PhoneError::InvalidCharacters));
        assert_eq!(Phone::parse("98765-4321"), Err(PhoneError::InvalidLength(9)));
        assert_eq!(Phone::parse("(01) 98765-4321"), Err(PhoneError::InvalidAreaCode));
    }

    #[test]
    fn test_formatting() {
        let mobile = Phone::parse("11987654321").unwrap();
        assert_eq!(mobile.formatted(), "(11) 98765-4321");
        assert_eq!(mobile.e164(), "+5511987654321");

        let landline = Phone::parse("2134567890").unwrap();
        assert_eq!(landline.to_string(), "(21) 3456-7890");
    }
}
