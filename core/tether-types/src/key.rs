//! Store keys.
//!
//! A [`StoreKey`] names one logical entity inside one owner's namespace:
//! a module's singleton state (`"brand_profile"`) or a single entity
//! (`"proj_1"`). Keys are never empty and never change for the lifetime
//! of the entity they name.

use crate::{Error, OwnerId, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, non-empty key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey(String);

impl StoreKey {
    /// Creates a key, rejecting empty or whitespace-only input.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidKey("key must not be empty".to_string()));
        }
        Ok(Self(key))
    }

    /// Builds an owner-scoped key such as `"<owner>:<module>"`.
    ///
    /// The local cache does not namespace keys itself, so callers that share
    /// one cache between several signed-in users should key through this.
    pub fn scoped(owner: &OwnerId, module: &str) -> Result<Self> {
        if module.trim().is_empty() {
            return Err(Error::InvalidKey("module must not be empty".to_string()));
        }
        Ok(Self(format!("{owner}:{module}")))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoreKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.0
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
