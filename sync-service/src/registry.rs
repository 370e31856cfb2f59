//! Registry of host-app sync managers, keyed by `(app_id, item_type)`.
//!
//! Host applications register an already-constructed manager at startup.

use crate::error::{FederatedSyncError, Result};
use crate::manager::FederatedSyncManager;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

type ManagerKey = (String, String);

/// Holds one [`FederatedSyncManager`] per `(app_id, item_type)`.
#[derive(Default)]
pub struct SyncManagerRegistry {
    managers: DashMap<ManagerKey, Arc<dyn FederatedSyncManager>>,
}

impl std::fmt::Debug for SyncManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .managers
            .iter()
            .map(|entry| format!("{}/{}", entry.key().0, entry.key().1))
            .collect();
        f.debug_struct("SyncManagerRegistry")
            .field("managers", &keys)
            .finish()
    }
}

impl SyncManagerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager.
    ///
    /// Returns whether it was stored. A manager with an empty app id or item
    /// type, or whose compatibility floor is above its own version, is
    /// dropped with a warning. Registering a second manager for the same key
    /// keeps the first one.
    pub fn register(&self, manager: Arc<dyn FederatedSyncManager>) -> bool {
        let app_id = manager.app_id().to_string();
        let item_type = manager.item_type().to_string();

        if app_id.is_empty() || item_type.is_empty() {
            tracing::warn!(
                app_id = %app_id,
                item_type = %item_type,
                "Dropping federated sync manager without app id or item type"
            );
            return false;
        }

        let compat = manager.compatibility();
        if compat.lower_back_compatibility > compat.version {
            tracing::warn!(
                app_id = %app_id,
                item_type = %item_type,
                version = compat.version,
                floor = compat.lower_back_compatibility,
                "Dropping federated sync manager that rejects its own version"
            );
            return false;
        }

        match self.managers.entry((app_id.clone(), item_type.clone())) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    app_id = %app_id,
                    item_type = %item_type,
                    "Federated sync manager already registered"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(manager);
                tracing::info!(
                    app_id = %app_id,
                    item_type = %item_type,
                    version = compat.version,
                    "Registered federated sync manager"
                );
                true
            }
        }
    }

    /// Look up the manager for `(app_id, item_type)`.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::FederatedSyncManagerNotFound`] if none is registered.
    pub fn lookup(&self, app_id: &str, item_type: &str) -> Result<Arc<dyn FederatedSyncManager>> {
        self.managers
            .get(&(app_id.to_string(), item_type.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FederatedSyncError::FederatedSyncManagerNotFound {
                app_id: app_id.to_string(),
                item_type: item_type.to_string(),
            })
    }

    /// Look up a manager for a message produced at `message_version`.
    ///
    /// # Errors
    ///
    /// Like [`lookup`](Self::lookup), plus
    /// [`FederatedSyncError::IncompatibleVersion`] when the manager's floor
    /// is above `message_version`.
    pub fn lookup_compatible(
        &self,
        app_id: &str,
        item_type: &str,
        message_version: u32,
    ) -> Result<Arc<dyn FederatedSyncManager>> {
        let manager = self.lookup(app_id, item_type)?;
        manager.compatibility().check(message_version)?;
        Ok(manager)
    }

    /// Number of registered managers.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no manager is registered.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
