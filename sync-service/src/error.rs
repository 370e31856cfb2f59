//! Error types for fedsync-service.

use std::path::PathBuf;
use sync_core::IncompatibleVersion;
use sync_types::{LockType, WireError};

use crate::manager::ManagerError;

/// Main error type for federated sync operations.
///
/// Raised where the condition is detected and returned unchanged through
/// the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum FederatedSyncError {
    /// The call carried no app id or item type.
    #[error("origin not bound: app id and item type are required")]
    OriginNotBound,

    /// The circle does not exist or is not visible to the actor.
    #[error("circle not found: {circle_id}")]
    CircleNotFound {
        /// The circle that was looked up.
        circle_id: String,
    },

    /// No synced item exists for the host-app item.
    #[error("synced item not found: {app_id}/{item_type}/{item_id}")]
    SyncedItemNotFound {
        /// Host application.
        app_id: String,
        /// Item type.
        item_type: String,
        /// Host-app-local identifier.
        item_id: String,
    },

    /// The host app refused the share creation.
    #[error("item {item_id} cannot be shared with circle {circle_id}")]
    ShareNotCreatable {
        /// Host-app-local identifier.
        item_id: String,
        /// Target circle.
        circle_id: String,
    },

    /// The host app refused the share modification.
    #[error("share of item {item_id} with circle {circle_id} cannot be modified")]
    ShareNotModifiable {
        /// Host-app-local identifier.
        item_id: String,
        /// Target circle.
        circle_id: String,
    },

    /// The host app refused the share deletion.
    #[error("share of item {item_id} with circle {circle_id} cannot be deleted")]
    ShareNotDeletable {
        /// Host-app-local identifier.
        item_id: String,
        /// Target circle.
        circle_id: String,
    },

    /// The share to modify does not exist.
    #[error("item {item_id} is not shared with circle {circle_id}")]
    ShareNotFound {
        /// Host-app-local identifier.
        item_id: String,
        /// Target circle.
        circle_id: String,
    },

    /// Another mutation holds a live lock.
    #[error("conflict: {update_type} {update_type_id} is locked by another update")]
    Conflict {
        /// Kind of locked entity.
        update_type: LockType,
        /// Identifier of the locked entity.
        update_type_id: String,
    },

    /// No manager is registered for the origin.
    #[error("no federated sync manager registered for {app_id}/{item_type}")]
    FederatedSyncManagerNotFound {
        /// Host application.
        app_id: String,
        /// Item type.
        item_type: String,
    },

    /// The acting user could not be resolved or is not a member.
    #[error("initiator not found: {0}")]
    InitiatorNotFound(String),

    /// The request needs protocol behavior this instance does not provide.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A committed change could not be handed off for delivery.
    #[error("propagation failed: {0}")]
    Propagation(String),

    /// A message is older than the receiver accepts.
    #[error("incompatible API version: {0}")]
    IncompatibleVersion(#[from] IncompatibleVersion),

    /// A host-app callback failed.
    #[error("sync manager error: {0}")]
    Manager(#[from] ManagerError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Wire data error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("invalid row in {table}: {reason}")]
    InvalidRow {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Result type alias for federated sync operations.
pub type Result<T> = std::result::Result<T, FederatedSyncError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
