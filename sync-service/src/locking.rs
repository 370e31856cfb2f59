//! Lock discipline shared by the item and share engines.

use crate::error::{FederatedSyncError, Result};
use crate::storage::SyncStorage;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use sync_core::{LockDecision, LockPolicy};
use sync_types::{LockType, SyncedItemLock};

/// Takes, confirms and releases [`SyncedItemLock`]s through storage.
#[derive(Clone)]
pub struct Locks {
    storage: Arc<dyn SyncStorage>,
    policy: LockPolicy,
}

impl Locks {
    /// Create a lock helper over `storage`.
    pub fn new(storage: Arc<dyn SyncStorage>, policy: LockPolicy) -> Self {
        Self { storage, policy }
    }

    /// Take the lock on `(update_type, update_type_id)`.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::Conflict`] if a live lock is held by someone else.
    pub async fn acquire(
        &self,
        update_type: LockType,
        update_type_id: &str,
    ) -> Result<SyncedItemLock> {
        let now = current_timestamp();
        let existing = self.storage.get_lock(update_type, update_type_id).await?;

        match self.policy.decide(existing.as_ref(), now) {
            LockDecision::Conflict { age_secs } => {
                tracing::debug!(
                    update_type = %update_type,
                    update_type_id,
                    age_secs,
                    "Lock held by another update"
                );
                return Err(conflict(update_type, update_type_id));
            }
            LockDecision::TakeOverStale { age_secs } => {
                tracing::warn!(
                    update_type = %update_type,
                    update_type_id,
                    age_secs,
                    "Taking over abandoned lock"
                );
            }
            LockDecision::Acquire => {}
        }

        // The read above only informs logging; the insert decides.
        let lock = SyncedItemLock::new(update_type, update_type_id, now);
        if self
            .storage
            .try_acquire_lock(&lock, self.policy.stale_cutoff(now))
            .await?
        {
            Ok(lock)
        } else {
            Err(conflict(update_type, update_type_id))
        }
    }

    /// Record the prospective checksum on a held lock and require it to be
    /// verified before commit.
    pub async fn confirm(&self, lock: &mut SyncedItemLock, checksum: &str) -> Result<()> {
        lock.verify_checksum = true;
        lock.checksum = Some(checksum.to_string());
        if self.storage.confirm_lock(lock).await? {
            Ok(())
        } else {
            Err(conflict(lock.update_type, &lock.update_type_id))
        }
    }

    /// Check that `lock` is still held and was taken for `checksum`.
    pub async fn verify_commit(&self, lock: &SyncedItemLock, checksum: &str) -> Result<()> {
        let stored = self
            .storage
            .get_lock(lock.update_type, &lock.update_type_id)
            .await?;
        if self.policy.may_commit(lock, stored.as_ref(), checksum) {
            Ok(())
        } else {
            Err(conflict(lock.update_type, &lock.update_type_id))
        }
    }

    /// Release `lock` and pass `result` through.
    ///
    /// A failed release turns a success into the storage error; after a
    /// failure the original error wins and the release error is logged.
    pub async fn release<T>(&self, lock: &SyncedItemLock, result: Result<T>) -> Result<T> {
        match (self.storage.release_lock(lock).await, result) {
            (Ok(released), result) => {
                if !released {
                    tracing::warn!(
                        update_type = %lock.update_type,
                        update_type_id = %lock.update_type_id,
                        "Lock was taken over before release"
                    );
                }
                result
            }
            (Err(e), Ok(_)) => Err(e.into()),
            (Err(e), Err(original)) => {
                tracing::warn!(
                    update_type = %lock.update_type,
                    update_type_id = %lock.update_type_id,
                    error = %e,
                    "Failed to release lock"
                );
                Err(original)
            }
        }
    }
}

fn conflict(update_type: LockType, update_type_id: &str) -> FederatedSyncError {
    FederatedSyncError::Conflict {
        update_type,
        update_type_id: update_type_id.to_string(),
    }
}

/// Current unix time in seconds.
pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
