//! Input validation contracts shared by the write path and the API layer.
//!
//! Two validator kinds, per spec: `Identifier` for type/relation/permission
//! names, `FreeFormId` for caller-supplied entity ids. Both distinguish
//! `Null | Empty | TooLong | InvalidChar | BadFormat` so callers can render
//! a precise diagnostic instead of a generic "invalid input".

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_LEN: usize = 1024;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap();
    static ref NAMESPACE_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ValidationError {
    #[error("null value not allowed")]
    Null,
    #[error("must not be empty")]
    Empty,
    #[error("exceeds maximum length of {0}")]
    TooLong(usize),
    #[error("contains an invalid character")]
    InvalidChar,
    #[error("does not match the required format")]
    BadFormat,
}

/// A type/relation/permission name: `^[a-z][a-z0-9_-]*$`, 1..=1024 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(ValidationError::TooLong(MAX_LEN));
        }
        if !IDENTIFIER_RE.is_match(&raw) {
            return Err(ValidationError::BadFormat);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A caller-supplied entity id: 1..=1024 chars, no C0 controls other than
/// TAB/LF/CR, no leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FreeFormId(String);

impl FreeFormId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(ValidationError::TooLong(MAX_LEN));
        }
        if raw.chars().any(|c| is_disallowed_control(c)) {
            return Err(ValidationError::InvalidChar);
        }
        if raw.trim() != raw {
            return Err(ValidationError::BadFormat);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_disallowed_control(c: char) -> bool {
    (c.is_control() && c as u32 <= 0x1f) && !matches!(c, '\t' | '\n' | '\r')
}

impl TryFrom<String> for FreeFormId {
    type Error = ValidationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FreeFormId> for String {
    fn from(value: FreeFormId) -> Self {
        value.0
    }
}

impl fmt::Display for FreeFormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FreeFormId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A tenant id: `^[a-z0-9][a-z0-9_-]*$`, 1..=1024 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(ValidationError::TooLong(MAX_LEN));
        }
        if !NAMESPACE_RE.is_match(&raw) {
            return Err(ValidationError::BadFormat);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Namespace {
    type Error = ValidationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate every element of an array, reporting the first offending index.
pub fn validate_array<T, F, E>(items: &[T], mut validate_one: F) -> Result<(), (usize, E)>
where
    F: FnMut(&T) -> Result<(), E>,
{
    for (idx, item) in items.iter().enumerate() {
        if let Err(e) = validate_one(item) {
            return Err((idx, e));
        }
    }
    Ok(())
}

/// A strictly-positive duration, used wherever semantics require forward
/// progress (e.g. `extend_expiration`'s interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PositiveDuration(chrono::Duration);

impl PositiveDuration {
    pub fn parse(d: chrono::Duration) -> Result<Self, ValidationError> {
        if d <= chrono::Duration::zero() {
            return Err(ValidationError::BadFormat);
        }
        Ok(Self(d))
    }

    pub fn get(&self) -> chrono::Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rejects_uppercase_and_leading_digit() {
        assert!(Identifier::parse("Repo").is_err());
        assert!(Identifier::parse("1repo").is_err());
        assert!(Identifier::parse("repo").is_ok());
        assert!(Identifier::parse("repo_v2-x").is_ok());
    }

    #[test]
    fn identifier_rejects_empty_and_too_long() {
        assert_eq!(Identifier::parse(""), Err(ValidationError::Empty));
        let long = "a".repeat(MAX_LEN + 1);
        assert_eq!(Identifier::parse(long), Err(ValidationError::TooLong(MAX_LEN)));
    }

    #[test]
    fn free_form_id_rejects_control_chars_and_surrounding_whitespace() {
        assert_eq!(FreeFormId::parse("alice\u{0007}"), Err(ValidationError::InvalidChar));
        assert_eq!(FreeFormId::parse(" alice"), Err(ValidationError::BadFormat));
        assert_eq!(FreeFormId::parse("alice "), Err(ValidationError::BadFormat));
        assert!(FreeFormId::parse("alice").is_ok());
    }

    #[test]
    fn free_form_id_allows_tab_lf_cr() {
        assert!(FreeFormId::parse("alice\tsmith").is_ok());
    }

    #[test]
    fn namespace_allows_leading_digit() {
        assert!(Namespace::parse("9acme").is_ok());
        assert!(Namespace::parse("Acme").is_err());
    }

    #[test]
    fn positive_duration_rejects_non_positive() {
        assert!(PositiveDuration::parse(chrono::Duration::zero()).is_err());
        assert!(PositiveDuration::parse(chrono::Duration::seconds(-1)).is_err());
        assert!(PositiveDuration::parse(chrono::Duration::seconds(1)).is_ok());
    }
}
