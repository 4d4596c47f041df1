//! Strongly-typed identifiers for Surge entities.
//!
//! Sale and user identifiers arrive as opaque strings from the transport
//! layer. They are validated once, at the boundary, and carried as distinct
//! types from then on so a user id can never be passed where a sale id is
//! expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of a sale identifier.
pub const MAX_SALE_ID_LEN: usize = 64;

/// Maximum length of a user identifier.
pub const MAX_USER_ID_LEN: usize = 255;

fn check_charset(kind: &'static str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidId {
            message: format!("{kind} must not be empty"),
        });
    }
    if value.len() > max_len {
        return Err(Error::InvalidId {
            message: format!("{kind} exceeds {max_len} characters"),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(Error::InvalidId {
            message: format!("{kind} contains invalid character {bad:?}"),
        });
    }
    Ok(())
}

/// A stable identifier for a sale.
///
/// Non-empty, at most [`MAX_SALE_ID_LEN`] characters, restricted to
/// `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SaleId(String);

impl SaleId {
    /// Creates a sale ID, validating length and charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] when the value is empty, too long, or
    /// contains a character outside `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_charset("sale id", &value, MAX_SALE_ID_LEN)?;
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SaleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for SaleId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SaleId> for String {
    fn from(value: SaleId) -> Self {
        value.0
    }
}

/// An opaque buyer identifier supplied by the surrounding transport.
///
/// Non-empty, at most [`MAX_USER_ID_LEN`] characters, restricted to
/// `[A-Za-z0-9_-]`. Validation happens here so the admission path can rely
/// on the identifier being well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a user ID, validating length and charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] when the value is empty, too long, or
    /// contains a character outside `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check_charset("user id", &value, MAX_USER_ID_LEN)?;
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// A unique identifier for a committed order, assigned by the order log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wraps a raw order-log row id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_id_roundtrip() {
        let id = SaleId::new("spring-drop_01").unwrap();
        let parsed: SaleId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn user_id_accepts_full_charset() {
        assert!(UserId::new("aZ0-_").is_ok());
    }

    #[test]
    fn user_id_rejects_empty() {
        assert!(UserId::new("").is_err());
    }

    #[test]
    fn user_id_rejects_invalid_characters() {
        assert!(UserId::new("user name").is_err());
        assert!(UserId::new("user@example").is_err());
        assert!(UserId::new("émile").is_err());
    }

    #[test]
    fn user_id_rejects_overlong() {
        let long = "u".repeat(MAX_USER_ID_LEN + 1);
        assert!(UserId::new(long).is_err());
        let max = "u".repeat(MAX_USER_ID_LEN);
        assert!(UserId::new(max).is_ok());
    }

    #[test]
    fn sale_id_rejects_overlong() {
        let long = "s".repeat(MAX_SALE_ID_LEN + 1);
        assert!(SaleId::new(long).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: std::result::Result<UserId, _> = serde_json::from_str("\"buyer-1\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<UserId, _> = serde_json::from_str("\"not valid\"");
        assert!(bad.is_err());
    }
}
