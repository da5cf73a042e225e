//! Strongly-typed migration identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Identifier of a single migration, usually a timestamp-prefixed file stem
/// such as `20240105120000_create_users`.
///
/// Ordering is plain string ordering. Timestamp prefixes of equal width make
/// that ordering chronological, which the planner relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationId(String);

impl MigrationId {
    /// Create a new `MigrationId`, panicking if the id is empty.
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub fn new(id: impl Into<String>) -> Self {
        let s = id.into();
        assert!(!s.trim().is_empty(), "MigrationId must not be empty");
        Self(s)
    }

    /// Try to create a new `MigrationId`, returning `None` if the id is blank.
    pub fn try_new(id: impl Into<String>) -> Option<Self> {
        let s = id.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Return the underlying id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for MigrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for MigrationId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MigrationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MigrationId {
    type Error = &'static str;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s).ok_or("MigrationId must not be empty")
    }
}

impl TryFrom<&str> for MigrationId {
    type Error = &'static str;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_new(s).ok_or("MigrationId must not be empty")
    }
}

impl From<MigrationId> for String {
    fn from(id: MigrationId) -> Self {
        id.0
    }
}

impl PartialEq<str> for MigrationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MigrationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
