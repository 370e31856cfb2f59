//! Mutual-exclusion record for one in-flight mutation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// What kind of entity a lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// An item update; the id is the item's single id.
    Item,
    /// A share mutation; the id is `"<single_id>:<circle_id>"`.
    Share,
}

impl LockType {
    /// The value stored in the `update_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Item => "item",
            LockType::Share => "share",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(LockType::Item),
            "share" => Ok(LockType::Share),
            other => Err(WireError::InvalidLockType(other.to_string())),
        }
    }
}

/// A lock on `(update_type, update_type_id)`.
///
/// At most one live lock exists per pair; liveness is bounded by `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedItemLock {
    /// Kind of entity being mutated.
    pub update_type: LockType,
    /// Identifier of the entity being mutated.
    pub update_type_id: String,
    /// Unix timestamp (seconds) when the lock was taken.
    pub time: i64,
    /// Whether the holder must re-validate the checksum before committing.
    #[serde(default)]
    pub verify_checksum: bool,
    /// Fingerprint of the prospective state, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl SyncedItemLock {
    /// Create a fresh lock taken at `time`.
    pub fn new(update_type: LockType, update_type_id: impl Into<String>, time: i64) -> Self {
        Self {
            update_type,
            update_type_id: update_type_id.into(),
            time,
            verify_checksum: false,
            checksum: None,
        }
    }

    /// Seconds elapsed since the lock was taken, never negative.
    pub fn age_secs(&self, now: i64) -> u64 {
        now.saturating_sub(self.time).max(0) as u64
    }
}
