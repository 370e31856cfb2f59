//! The sharing relationship between an item and a circle.

use serde::{Deserialize, Serialize};

use crate::SingleId;

/// An active share of one item with one circle.
///
/// The existence of the record is the "shared" state: at most one exists per
/// `(single_id, circle_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedShare {
    /// The shared item.
    pub single_id: SingleId,
    /// The circle the item is shared with.
    pub circle_id: String,
}

impl SyncedShare {
    /// Create a share record.
    pub fn new(single_id: SingleId, circle_id: impl Into<String>) -> Self {
        Self {
            single_id,
            circle_id: circle_id.into(),
        }
    }
}
