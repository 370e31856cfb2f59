//! SQLite storage backend for fedsync-service.

use super::SyncStorage;
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use sync_types::{LockType, SingleId, SyncedItem, SyncedItemLock, SyncedShare};

const ITEM_COLUMNS: &str = "single_id, instance, app_id, item_type, item_id, checksum, deleted";
const LOCK_COLUMNS: &str = "update_type, update_type_id, time, verify_checksum, checksum";

/// SQLite-based synced-entity storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that never recycles: closing it drops the database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(Option::<Duration>::None)
            .max_lifetime(Option::<Duration>::None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS synced_items (
                single_id TEXT PRIMARY KEY,
                instance TEXT NOT NULL DEFAULT '',
                app_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                item_id TEXT NOT NULL,
                checksum TEXT NOT NULL DEFAULT '',
                deleted INTEGER NOT NULL DEFAULT 0,
                UNIQUE(instance, app_id, item_type, item_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("synced_items: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS synced_shares (
                single_id TEXT NOT NULL,
                circle_id TEXT NOT NULL,
                PRIMARY KEY (single_id, circle_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("synced_shares: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS synced_item_locks (
                update_type TEXT NOT NULL,
                update_type_id TEXT NOT NULL,
                time INTEGER NOT NULL,
                verify_checksum INTEGER NOT NULL DEFAULT 0,
                checksum TEXT,
                PRIMARY KEY (update_type, update_type_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("synced_item_locks: {e}")))?;

        // Create indexes
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_items_lookup ON synced_items(app_id, item_type, item_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_locks_time ON synced_item_locks(time)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl SyncStorage for SqliteStorage {
    async fn find_item(
        &self,
        app_id: &str,
        item_type: &str,
        item_id: &str,
    ) -> Result<Option<SyncedItem>, StorageError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM synced_items
            WHERE app_id = ?1 AND item_type = ?2 AND item_id = ?3
            ORDER BY (instance = '') DESC
            LIMIT 1
            "#
        ))
        .bind(app_id)
        .bind(item_type)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(SyncedItem::try_from).transpose()
    }

    async fn get_item(&self, single_id: &SingleId) -> Result<Option<SyncedItem>, StorageError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM synced_items WHERE single_id = ?1"
        ))
        .bind(single_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(SyncedItem::try_from).transpose()
    }

    async fn insert_item(&self, item: &SyncedItem) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO synced_items (single_id, instance, app_id, item_type, item_id, checksum, deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(item.single_id.as_str())
        .bind(&item.instance)
        .bind(&item.app_id)
        .bind(&item.item_type)
        .bind(&item.item_id)
        .bind(&item.checksum)
        .bind(item.deleted)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_item(&self, item: &SyncedItem) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO synced_items (single_id, instance, app_id, item_type, item_id, checksum, deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(single_id) DO UPDATE SET
                instance = excluded.instance,
                checksum = excluded.checksum,
                deleted = (synced_items.deleted OR excluded.deleted)
            "#,
        )
        .bind(item.single_id.as_str())
        .bind(&item.instance)
        .bind(&item.app_id)
        .bind(&item.item_type)
        .bind(&item.item_id)
        .bind(&item.checksum)
        .bind(item.deleted)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }

    async fn update_checksum(
        &self,
        single_id: &SingleId,
        checksum: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE synced_items SET checksum = ?2 WHERE single_id = ?1")
            .bind(single_id.as_str())
            .bind(checksum)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn tombstone_item(&self, single_id: &SingleId) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        sqlx::query("UPDATE synced_items SET deleted = 1 WHERE single_id = ?1")
            .bind(single_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        let removed = sqlx::query("DELETE FROM synced_shares WHERE single_id = ?1")
            .bind(single_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(removed.rows_affected())
    }

    async fn insert_share(&self, share: &SyncedShare) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO synced_shares (single_id, circle_id)
            VALUES (?1, ?2)
            ON CONFLICT(single_id, circle_id) DO NOTHING
            "#,
        )
        .bind(share.single_id.as_str())
        .bind(&share.circle_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_share(&self, share: &SyncedShare) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM synced_shares WHERE single_id = ?1 AND circle_id = ?2")
            .bind(share.single_id.as_str())
            .bind(&share.circle_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_share(
        &self,
        single_id: &SingleId,
        circle_id: &str,
    ) -> Result<Option<SyncedShare>, StorageError> {
        let row = sqlx::query_as::<_, ShareRow>(
            "SELECT single_id, circle_id FROM synced_shares WHERE single_id = ?1 AND circle_id = ?2",
        )
        .bind(single_id.as_str())
        .bind(circle_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(SyncedShare::try_from).transpose()
    }

    async fn get_shares(&self, single_id: &SingleId) -> Result<Vec<SyncedShare>, StorageError> {
        let rows = sqlx::query_as::<_, ShareRow>(
            r#"
            SELECT single_id, circle_id
            FROM synced_shares
            WHERE single_id = ?1
            ORDER BY circle_id ASC
            "#,
        )
        .bind(single_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(SyncedShare::try_from).collect()
    }

    async fn try_acquire_lock(
        &self,
        lock: &SyncedItemLock,
        stale_cutoff: i64,
    ) -> Result<bool, StorageError> {
        // Insert if absent, take over if stale, otherwise touch nothing.
        let result = sqlx::query(
            r#"
            INSERT INTO synced_item_locks (update_type, update_type_id, time, verify_checksum, checksum)
            VALUES (?1, ?2, ?3, 0, NULL)
            ON CONFLICT(update_type, update_type_id) DO UPDATE SET
                time = excluded.time,
                verify_checksum = 0,
                checksum = NULL
            WHERE synced_item_locks.time <= ?4
            "#,
        )
        .bind(lock.update_type.as_str())
        .bind(&lock.update_type_id)
        .bind(lock.time)
        .bind(stale_cutoff)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_lock(
        &self,
        update_type: LockType,
        update_type_id: &str,
    ) -> Result<Option<SyncedItemLock>, StorageError> {
        let row = sqlx::query_as::<_, LockRow>(&format!(
            "SELECT {LOCK_COLUMNS} FROM synced_item_locks WHERE update_type = ?1 AND update_type_id = ?2"
        ))
        .bind(update_type.as_str())
        .bind(update_type_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(SyncedItemLock::try_from).transpose()
    }

    async fn confirm_lock(&self, lock: &SyncedItemLock) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE synced_item_locks
            SET verify_checksum = ?4, checksum = ?5
            WHERE update_type = ?1 AND update_type_id = ?2 AND time = ?3
            "#,
        )
        .bind(lock.update_type.as_str())
        .bind(&lock.update_type_id)
        .bind(lock.time)
        .bind(lock.verify_checksum)
        .bind(lock.checksum.as_deref())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, lock: &SyncedItemLock) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM synced_item_locks
            WHERE update_type = ?1 AND update_type_id = ?2 AND time = ?3
            "#,
        )
        .bind(lock.update_type.as_str())
        .bind(&lock.update_type_id)
        .bind(lock.time)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn cleanup_stale_locks(&self, stale_cutoff: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM synced_item_locks WHERE time <= ?1")
            .bind(stale_cutoff)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected())
    }
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct ItemRow {
    single_id: String,
    instance: String,
    app_id: String,
    item_type: String,
    item_id: String,
    checksum: String,
    deleted: bool,
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    single_id: String,
    circle_id: String,
}

#[derive(sqlx::FromRow)]
struct LockRow {
    update_type: String,
    update_type_id: String,
    time: i64,
    verify_checksum: bool,
    checksum: Option<String>,
}

fn parse_single_id(table: &'static str, value: &str) -> Result<SingleId, StorageError> {
    SingleId::parse(value).map_err(|e| StorageError::InvalidRow {
        table,
        reason: e.to_string(),
    })
}

impl TryFrom<ItemRow> for SyncedItem {
    type Error = StorageError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(SyncedItem {
            single_id: parse_single_id("synced_items", &row.single_id)?,
            instance: row.instance,
            app_id: row.app_id,
            item_type: row.item_type,
            item_id: row.item_id,
            checksum: row.checksum,
            serialized: None,
            deleted: row.deleted,
        })
    }
}

impl TryFrom<ShareRow> for SyncedShare {
    type Error = StorageError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        Ok(SyncedShare {
            single_id: parse_single_id("synced_shares", &row.single_id)?,
            circle_id: row.circle_id,
        })
    }
}

impl TryFrom<LockRow> for SyncedItemLock {
    type Error = StorageError;

    fn try_from(row: LockRow) -> Result<Self, Self::Error> {
        let update_type = row
            .update_type
            .parse::<LockType>()
            .map_err(|e| StorageError::InvalidRow {
                table: "synced_item_locks",
                reason: e.to_string(),
            })?;

        Ok(SyncedItemLock {
            update_type,
            update_type_id: row.update_type_id,
            time: row.time,
            verify_checksum: row.verify_checksum,
            checksum: row.checksum,
        })
    }
}
