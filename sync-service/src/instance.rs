//! This instance's address, and the mapping of item ownership between the
//! local form (empty instance) and the wire form (explicit address).

use sync_types::SyncedItem;

/// The federation address of the running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInstance {
    address: String,
}

impl LocalInstance {
    /// Create from the configured address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// The configured address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Prepare an item for sending: local ownership becomes this address.
    pub fn export_item(&self, item: &SyncedItem) -> SyncedItem {
        let mut exported = item.clone();
        if exported.is_local() {
            exported.instance = self.address.clone();
        }
        exported
    }

    /// Interpret a received item: this address becomes local ownership.
    pub fn import_item(&self, item: &SyncedItem) -> SyncedItem {
        let mut imported = item.clone();
        if imported.instance == self.address {
            imported.instance.clear();
        }
        imported
    }
}
