//! Background cleanup task for abandoned locks.
//!
//! Runs periodically to delete locks older than the staleness window, so a
//! crashed holder does not leave rows behind until the next acquire.

use crate::config::CleanupConfig;
use crate::locking::current_timestamp;
use crate::storage::SyncStorage;
use std::sync::Arc;
use std::time::Duration;
use sync_core::LockPolicy;
use tokio::time::interval;

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    storage: Arc<dyn SyncStorage>,
    config: CleanupConfig,
    policy: LockPolicy,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!(
            "Cleanup task started (interval: {}s, stale after: {}s)",
            interval_secs,
            policy.stale_after().as_secs()
        );

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            sweep(storage.as_ref(), &policy).await;
        }
    })
}

/// Run one sweep. Returns the number of locks removed.
pub async fn sweep(storage: &dyn SyncStorage, policy: &LockPolicy) -> u64 {
    match storage
        .cleanup_stale_locks(policy.stale_cutoff(current_timestamp()))
        .await
    {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!("Cleanup: removed {} stale locks", deleted);
            } else {
                tracing::debug!("Cleanup: no stale locks");
            }
            deleted
        }
        Err(e) => {
            tracing::error!("Cleanup error: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use sync_types::{LockType, SyncedItemLock};

    #[tokio::test]
    async fn sweep_removes_only_stale_locks() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let policy = LockPolicy::new(Duration::from_secs(60));
        let now = current_timestamp();

        let stale = SyncedItemLock::new(LockType::Item, "old", now - 120);
        let live = SyncedItemLock::new(LockType::Share, "new", now);
        storage.try_acquire_lock(&stale, 0).await.unwrap();
        storage.try_acquire_lock(&live, 0).await.unwrap();

        assert_eq!(sweep(storage.as_ref(), &policy).await, 1);
        assert!(storage.get_lock(LockType::Item, "old").await.unwrap().is_none());
        assert!(storage.get_lock(LockType::Share, "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_task_disabled() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let config = CleanupConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_cleanup_task(storage, config, LockPolicy::default());

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn cleanup_task_runs_first_sweep_immediately() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let stale = SyncedItemLock::new(LockType::Item, "old", current_timestamp() - 3600);
        storage.try_acquire_lock(&stale, 0).await.unwrap();

        let handle = spawn_cleanup_task(
            storage.clone(),
            CleanupConfig {
                interval_secs: 3600,
                enabled: true,
            },
            LockPolicy::new(Duration::from_secs(60)),
        );

        let mut gone = false;
        for _ in 0..50 {
            if storage.get_lock(LockType::Item, "old").await.unwrap().is_none() {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(gone);
    }
}
