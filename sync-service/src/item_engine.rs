//! Item resolution, creation, update and tombstoning.
//!
//! Updates run under the `item` lock:
//!
//! ```text
//! acquire lock -> is_item_updatable -> confirm lock with prospective checksum
//!   -> (owner) verify lock, sync_item, store checksum -> propagate -> release
//! ```
//!
//! Receivers apply propagated state through [`ItemSyncEngine::apply_item_sync`],
//! which is a no-op when the payload's checksum is already stored.

use crate::error::{FederatedSyncError, Result};
use crate::federation::{FederatedEvent, Propagation, Propagator};
use crate::instance::LocalInstance;
use crate::locking::Locks;
use crate::manager::FederatedSyncManager;
use crate::origin::Origin;
use crate::registry::SyncManagerRegistry;
use crate::storage::SyncStorage;
use std::sync::Arc;
use sync_core::{checksum, FanOut};
use sync_types::{
    FederatedUser, LockType, Payload, SingleId, SyncedItem, SyncedItemLock, SyncedWrapper,
    WireError,
};

/// Drives the lifecycle of [`SyncedItem`]s.
#[derive(Clone)]
pub struct ItemSyncEngine {
    storage: Arc<dyn SyncStorage>,
    registry: Arc<SyncManagerRegistry>,
    propagator: Arc<dyn Propagator>,
    locks: Locks,
    instance: LocalInstance,
}

impl ItemSyncEngine {
    /// Create an engine.
    pub fn new(
        storage: Arc<dyn SyncStorage>,
        registry: Arc<SyncManagerRegistry>,
        propagator: Arc<dyn Propagator>,
        locks: Locks,
        instance: LocalInstance,
    ) -> Self {
        Self {
            storage,
            registry,
            propagator,
            locks,
            instance,
        }
    }

    /// Find the item for `item_id`, creating a local one if allowed.
    ///
    /// A newly created item carries its serialized state.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::SyncedItemNotFound`] if the item is unknown and
    /// `create_if_missing` is false.
    pub async fn resolve_or_create(
        &self,
        origin: &Origin,
        item_id: &str,
        create_if_missing: bool,
    ) -> Result<SyncedItem> {
        if let Some(item) = self
            .storage
            .find_item(origin.app_id(), origin.item_type(), item_id)
            .await?
        {
            return Ok(item);
        }
        if !create_if_missing {
            return Err(not_found(origin, item_id));
        }

        let manager = self.registry.lookup(origin.app_id(), origin.item_type())?;
        let serialized = manager.serialize_item(item_id).await?;
        let item = SyncedItem::new_local(
            SingleId::generate(),
            origin.app_id(),
            origin.item_type(),
            item_id,
            checksum(&serialized),
        );

        if self.storage.insert_item(&item).await? {
            tracing::debug!(
                app_id = %origin.app_id(),
                item_type = %origin.item_type(),
                item_id,
                single_id = %item.single_id,
                "Created synced item"
            );
            return Ok(item.with_serialized(serialized));
        }

        // Lost the race to a concurrent creator; use its row.
        self.storage
            .find_item(origin.app_id(), origin.item_type(), item_id)
            .await?
            .ok_or_else(|| not_found(origin, item_id))
    }

    /// Run an update of `item` requested by `actor`.
    ///
    /// Returns the wrapper handed off for propagation.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::Conflict`] if another update holds the item
    /// lock; any veto from `is_item_updatable` as
    /// [`FederatedSyncError::Manager`].
    pub async fn request_update(
        &self,
        actor: &FederatedUser,
        item: &SyncedItem,
        extra_data: &Payload,
    ) -> Result<SyncedWrapper> {
        if item.deleted {
            return Err(FederatedSyncError::SyncedItemNotFound {
                app_id: item.app_id.clone(),
                item_type: item.item_type.clone(),
                item_id: item.item_id.clone(),
            });
        }
        let manager = self.registry.lookup(&item.app_id, &item.item_type)?;
        let mut lock = self
            .locks
            .acquire(LockType::Item, item.single_id.as_str())
            .await?;

        let result = self
            .run_update(manager.as_ref(), actor, item, extra_data, &mut lock)
            .await;
        self.locks.release(&lock, result).await
    }

    async fn run_update(
        &self,
        manager: &dyn FederatedSyncManager,
        actor: &FederatedUser,
        item: &SyncedItem,
        extra_data: &Payload,
        lock: &mut SyncedItemLock,
    ) -> Result<SyncedWrapper> {
        let prospective = manager
            .is_item_updatable(&item.item_id, extra_data, actor)
            .await?;
        let new_checksum = checksum(&prospective);
        self.locks.confirm(lock, &new_checksum).await?;

        if item.is_local() {
            self.locks.verify_commit(lock, &new_checksum).await?;
            manager.sync_item(&item.item_id, &prospective).await?;
            self.storage
                .update_checksum(&item.single_id, &new_checksum)
                .await?;
        }

        let mut outgoing = self.instance.export_item(item);
        outgoing.checksum = new_checksum;
        let wrapper = SyncedWrapper::new()
            .with_federated_user(actor.clone())
            .with_item(outgoing.with_serialized(prospective))
            .with_lock(lock.clone())
            .with_extra_data(extra_data.clone());

        self.propagator
            .propagate(Propagation {
                event: FederatedEvent::ItemUpdated,
                scope: FanOut::for_manager(manager.is_full_support()),
                api_version: manager.api_version(),
                wrapper: wrapper.clone(),
            })
            .await?;

        tracing::debug!(
            single_id = %item.single_id,
            item_id = %item.item_id,
            local = item.is_local(),
            "Item update handed off"
        );
        Ok(wrapper)
    }

    /// Tombstone a local item and end all its shares.
    ///
    /// Deleting an already deleted item only re-propagates the deletion.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::NotSupported`] for items owned by another
    /// instance.
    pub async fn delete_item(
        &self,
        actor: &FederatedUser,
        item: &SyncedItem,
        extra_data: &Payload,
    ) -> Result<SyncedItem> {
        if !item.is_local() {
            return Err(FederatedSyncError::NotSupported(format!(
                "item {} is owned by {} and can only be deleted there",
                item.item_id, item.instance
            )));
        }
        let manager = self.registry.lookup(&item.app_id, &item.item_type)?;
        let lock = self
            .locks
            .acquire(LockType::Item, item.single_id.as_str())
            .await?;

        let result = self
            .run_delete(manager.as_ref(), actor, item, extra_data, &lock)
            .await;
        self.locks.release(&lock, result).await
    }

    async fn run_delete(
        &self,
        manager: &dyn FederatedSyncManager,
        actor: &FederatedUser,
        item: &SyncedItem,
        extra_data: &Payload,
        lock: &SyncedItemLock,
    ) -> Result<SyncedItem> {
        let removed = self.storage.tombstone_item(&item.single_id).await?;
        let mut deleted = item.clone();
        deleted.deleted = true;
        deleted.serialized = None;

        tracing::info!(
            single_id = %item.single_id,
            item_id = %item.item_id,
            shares_removed = removed,
            "Item tombstoned"
        );

        let wrapper = SyncedWrapper::new()
            .with_federated_user(actor.clone())
            .with_item(self.instance.export_item(&deleted))
            .with_lock(lock.clone())
            .with_extra_data(extra_data.clone());
        self.propagator
            .propagate(Propagation {
                event: FederatedEvent::ItemDeleted,
                scope: FanOut::for_manager(manager.is_full_support()),
                api_version: manager.api_version(),
                wrapper,
            })
            .await?;

        Ok(deleted)
    }

    /// Apply an item update or deletion received from another instance.
    ///
    /// Returns whether anything changed locally. A payload whose checksum is
    /// already stored does not reach the manager again.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::IncompatibleVersion`] if `message_version` is
    /// below the local manager's floor; [`FederatedSyncError::Wire`] if the
    /// wrapper has no item or an update carries no serialized state.
    pub async fn apply_item_sync(
        &self,
        message_version: u32,
        wrapper: &SyncedWrapper,
    ) -> Result<bool> {
        let incoming = self.instance.import_item(wrapper.require_item()?);
        let manager = self.registry.lookup_compatible(
            &incoming.app_id,
            &incoming.item_type,
            message_version,
        )?;
        let stored = mirror_item(self.storage.as_ref(), &incoming).await?;

        if stored.deleted {
            tracing::debug!(single_id = %stored.single_id, "Ignoring sync for tombstoned item");
            return Ok(false);
        }
        if incoming.deleted {
            let removed = self.storage.tombstone_item(&stored.single_id).await?;
            tracing::info!(
                single_id = %stored.single_id,
                shares_removed = removed,
                "Mirrored item tombstoned"
            );
            return Ok(true);
        }

        let payload = incoming
            .serialized
            .as_ref()
            .ok_or(WireError::MissingPart("serialized state"))?;
        let new_checksum = checksum(payload);
        if new_checksum == stored.checksum {
            tracing::debug!(single_id = %stored.single_id, "Item already in sync");
            return Ok(false);
        }

        manager.sync_item(&stored.item_id, payload).await?;
        self.storage
            .update_checksum(&stored.single_id, &new_checksum)
            .await?;
        tracing::debug!(
            single_id = %stored.single_id,
            item_id = %stored.item_id,
            "Applied item sync"
        );
        Ok(true)
    }
}

/// The stored record for an incoming item, mirroring it first if unknown.
///
/// Mirrors start with an empty checksum so the first payload is applied.
pub(crate) async fn mirror_item(
    storage: &dyn SyncStorage,
    incoming: &SyncedItem,
) -> Result<SyncedItem> {
    if let Some(stored) = storage.get_item(&incoming.single_id).await? {
        return Ok(stored);
    }
    if incoming.is_local() {
        // Claims to be ours but we have no record of it.
        return Err(FederatedSyncError::SyncedItemNotFound {
            app_id: incoming.app_id.clone(),
            item_type: incoming.item_type.clone(),
            item_id: incoming.item_id.clone(),
        });
    }

    let mut mirror = incoming.clone();
    mirror.checksum.clear();
    mirror.serialized = None;
    storage.save_item(&mirror).await?;
    tracing::debug!(
        single_id = %mirror.single_id,
        instance = %mirror.instance,
        "Mirrored remote item"
    );
    Ok(mirror)
}

fn not_found(origin: &Origin, item_id: &str) -> FederatedSyncError {
    FederatedSyncError::SyncedItemNotFound {
        app_id: origin.app_id().to_string(),
        item_type: origin.item_type().to_string(),
        item_id: item_id.to_string(),
    }
}
