//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is not `local@domain`.
    #[error("email must look like name@domain")]
    Malformed,
}

/// An email address as entered on the affidavit form.
///
/// Only structural checks are made: exactly one `@`, a non-empty local part,
/// and a domain containing a dot. Deliverability is the mail server's problem.
///
/// ```
/// use affidavit_core::Email;
///
/// assert!(Email::parse("lab@clinic.example").is_ok());
/// assert!(Email::parse("lab@clinic").is_err());
/// assert!(Email::parse("@clinic.example").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or malformed.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::Malformed)?;
        let domain_ok = !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if local.is_empty() || !domain_ok {
            return Err(EmailError::Malformed);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Email::parse("orders@factor2.example").is_ok());
        assert!(Email::parse("a.b+tag@sub.example.co.uk").is_ok());
        assert_eq!(
            Email::parse("  lab@clinic.example ").map(|e| e.as_str().to_owned()),
            Ok("lab@clinic.example".to_owned())
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("no-at-symbol"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@domain.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@localhost"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        );
    }
}
