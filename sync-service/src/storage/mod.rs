//! Storage layer for fedsync-service.
//!
//! Persists synced items, shares and locks. Persistence is the only state
//! shared between requests; writers go through the lock discipline, readers
//! may observe slightly stale rows.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use sync_types::{LockType, SingleId, SyncedItem, SyncedItemLock, SyncedShare};

/// Trait for synced-entity storage backends.
#[async_trait]
pub trait SyncStorage: Send + Sync {
    /// Find the item for a host-app item id.
    ///
    /// When both a local item and a mirrored remote item carry the same
    /// `(app_id, item_type, item_id)`, the local one is returned.
    async fn find_item(
        &self,
        app_id: &str,
        item_type: &str,
        item_id: &str,
    ) -> Result<Option<SyncedItem>, StorageError>;

    /// Get an item by its single id.
    async fn get_item(&self, single_id: &SingleId) -> Result<Option<SyncedItem>, StorageError>;

    /// Insert a new item unless one with the same single id or the same
    /// `(instance, app_id, item_type, item_id)` already exists.
    ///
    /// Returns whether the row was inserted.
    async fn insert_item(&self, item: &SyncedItem) -> Result<bool, StorageError>;

    /// Insert or refresh a mirrored item, keyed by single id.
    ///
    /// The tombstone flag never goes back from deleted to live.
    async fn save_item(&self, item: &SyncedItem) -> Result<(), StorageError>;

    /// Replace the stored checksum of an item.
    ///
    /// Returns whether the item exists.
    async fn update_checksum(
        &self,
        single_id: &SingleId,
        checksum: &str,
    ) -> Result<bool, StorageError>;

    /// Mark an item deleted and remove all its shares, atomically.
    ///
    /// Returns the number of shares removed.
    async fn tombstone_item(&self, single_id: &SingleId) -> Result<u64, StorageError>;

    /// Insert a share. Returns false if it already existed.
    async fn insert_share(&self, share: &SyncedShare) -> Result<bool, StorageError>;

    /// Hard-delete a share. Returns false if it did not exist.
    async fn delete_share(&self, share: &SyncedShare) -> Result<bool, StorageError>;

    /// Get one share.
    async fn get_share(
        &self,
        single_id: &SingleId,
        circle_id: &str,
    ) -> Result<Option<SyncedShare>, StorageError>;

    /// Get all shares of an item, ordered by circle id.
    async fn get_shares(&self, single_id: &SingleId) -> Result<Vec<SyncedShare>, StorageError>;

    /// Atomically take a lock.
    ///
    /// Succeeds when no lock exists for `(update_type, update_type_id)` or
    /// when the existing one was taken at or before `stale_cutoff`. Two
    /// concurrent callers never both succeed.
    async fn try_acquire_lock(
        &self,
        lock: &SyncedItemLock,
        stale_cutoff: i64,
    ) -> Result<bool, StorageError>;

    /// Get the current lock for an entity.
    async fn get_lock(
        &self,
        update_type: LockType,
        update_type_id: &str,
    ) -> Result<Option<SyncedItemLock>, StorageError>;

    /// Store `verify_checksum` and `checksum` on a lock still held by the
    /// caller. Returns false if the lock was lost.
    async fn confirm_lock(&self, lock: &SyncedItemLock) -> Result<bool, StorageError>;

    /// Release a lock still held by the caller. Returns false if it was
    /// already gone or taken over.
    async fn release_lock(&self, lock: &SyncedItemLock) -> Result<bool, StorageError>;

    /// Remove locks taken at or before `stale_cutoff`.
    ///
    /// Returns the number of locks deleted.
    async fn cleanup_stale_locks(&self, stale_cutoff: i64) -> Result<u64, StorageError>;
}
