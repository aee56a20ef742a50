//! Identifier types used throughout tether.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Shared string and UUID conversions for the UUID-backed ids below.
macro_rules! uuid_id {
    ($name:ident, $what:literal) => {
        impl $name {
            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            #[doc = concat!("Parses ", $what, " from its hyphenated form.")]
            pub fn parse(s: &str) -> Result<Self> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self.0.as_hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// The signed-in user whose namespace a record belongs to.
///
/// Issued by the auth provider, so any UUID version is accepted. Rows and
/// filters carry it in its hyphenated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

uuid_id!(OwnerId, "an owner id");

impl OwnerId {
    /// Generates a random owner id, for local accounts and tests.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps the user id reported by the auth provider.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns true for the nil UUID, which auth providers never issue.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Names one revision in a history stack. UUID v7: ids taken later sort
/// after ids taken earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

uuid_id!(SnapshotId, "a snapshot id");

impl SnapshotId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Milliseconds since the Unix epoch at which the id was generated.
    /// `None` for ids that were not generated as UUID v7.
    #[must_use]
    pub fn created_at_millis(&self) -> Option<u64> {
        let (secs, nanos) = self.0.get_timestamp()?.to_unix();
        Some(secs * 1000 + u64::from(nanos) / 1_000_000)
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}
