//! The item record the protocol keeps for every shared object.

use serde::{Deserialize, Serialize};

use crate::{Payload, SingleId};

/// One item known to the protocol.
///
/// `(app_id, item_type, item_id)` is unique per owning instance. The
/// `single_id` never changes, and deletion leaves a tombstone instead of
/// removing the record so other instances can observe it by checksum diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedItem {
    /// Federation-wide identifier.
    pub single_id: SingleId,
    /// Owning instance address; empty when this instance owns the item.
    #[serde(default)]
    pub instance: String,
    /// Host application owning the item type.
    pub app_id: String,
    /// Item type within the host application.
    pub item_type: String,
    /// Host-app-local identifier.
    pub item_id: String,
    /// Fingerprint of the last known serialized state.
    #[serde(default)]
    pub checksum: String,
    /// Serialized state, only populated while in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized: Option<Payload>,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
}

impl SyncedItem {
    /// Create a record for an item owned by this instance.
    pub fn new_local(
        single_id: SingleId,
        app_id: impl Into<String>,
        item_type: impl Into<String>,
        item_id: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            single_id,
            instance: String::new(),
            app_id: app_id.into(),
            item_type: item_type.into(),
            item_id: item_id.into(),
            checksum: checksum.into(),
            serialized: None,
            deleted: false,
        }
    }

    /// Whether this instance owns the item.
    pub fn is_local(&self) -> bool {
        self.instance.is_empty()
    }

    /// Whether the serialized state is attached.
    pub fn has_serialized(&self) -> bool {
        self.serialized.is_some()
    }

    /// Attach serialized state for transport.
    pub fn with_serialized(mut self, serialized: Payload) -> Self {
        self.serialized = Some(serialized);
        self
    }

    /// Whether both records describe the same item in the same state.
    ///
    /// The transient `serialized` payload is not part of the comparison.
    pub fn same_state(&self, other: &SyncedItem) -> bool {
        self.single_id == other.single_id
            && self.checksum == other.checksum
            && self.deleted == other.deleted
    }
}
