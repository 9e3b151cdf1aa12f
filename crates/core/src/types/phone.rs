//! Recipient phone number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// Nothing was entered.
    #[error("phone number cannot be empty")]
    Empty,
    /// A character other than digits, spaces, dots, dashes or a leading `+`.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// Fewer than 9 or more than 15 digits.
    #[error("phone number must have between 9 and 15 digits")]
    InvalidLength,
}

/// A phone number reduced to its digits (with an optional leading `+`).
///
/// Spaces, dots and dashes are accepted as separators and dropped, so
/// `0912 345 678`, `0912.345.678` and `+84-912-345-678` all parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 9;
    const MAX_DIGITS: usize = 15;

    /// Parse a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains characters other
    /// than separators and digits, or has a digit count outside 9..=15.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let (plus, rest) = trimmed
            .strip_prefix('+')
            .map_or((false, trimmed), |rest| (true, rest));

        let mut digits = String::with_capacity(rest.len() + 1);
        if plus {
            digits.push('+');
        }
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '.' | '-' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let count = digits.len() - usize::from(plus);
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&count) {
            return Err(PhoneError::InvalidLength);
        }

        Ok(Self(digits))
    }

    /// The normalised number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_separators() {
        assert_eq!(PhoneNumber::parse("0912 345 678").unwrap().as_str(), "0912345678");
        assert_eq!(PhoneNumber::parse("0912.345.678").unwrap().as_str(), "0912345678");
        assert_eq!(
            PhoneNumber::parse("+84-912-345-678").unwrap().as_str(),
            "+84912345678"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(PhoneNumber::parse("  "), Err(PhoneError::Empty));
        assert_eq!(
            PhoneNumber::parse("0912a45678"),
            Err(PhoneError::InvalidCharacter('a'))
        );
        assert_eq!(PhoneNumber::parse("12345"), Err(PhoneError::InvalidLength));
        assert_eq!(
            PhoneNumber::parse("1234567890123456"),
            Err(PhoneError::InvalidLength)
        );
    }
}
