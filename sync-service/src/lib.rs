//! # fedsync-service
//!
//! Federated item/share synchronization between server instances.
//!
//! An item (a file, a folder, a calendar...) is owned by exactly one
//! instance; the members of the circle it is shared with may live on many.
//! This crate keeps the item's state and its shares consistent across them:
//!
//! - Host applications plug item types in by implementing
//!   [`FederatedSyncManager`] and registering it.
//! - [`SyncCoordinator`] is the entry point for local requests and for
//!   messages propagated by other instances.
//! - Updates are serialized by a time-bounded lock in storage; replays are
//!   detected by payload checksum.
//!
//! ## Architecture
//!
//! ```text
//! host app ──► SyncCoordinator ──► ItemSyncEngine ──┐
//!                    │                               ├──► FederatedSyncManager
//!                    └────────────► ShareSyncEngine ─┘
//!                                        │
//!                     SyncStorage (SQLite) ◄──┴──► Propagator ──► other instances
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod federation;
pub mod instance;
pub mod item_engine;
pub mod locking;
pub mod manager;
pub mod mock;
pub mod origin;
pub mod registry;
pub mod share_engine;
pub mod storage;

pub use coordinator::{Collaborators, SyncCoordinator};
pub use error::{FederatedSyncError, Result, StorageError};
pub use federation::{
    ActorResolver, Circle, CircleProvider, FederatedEvent, LogPropagator, MemberLevel,
    Propagation, Propagator,
};
pub use instance::LocalInstance;
pub use item_engine::ItemSyncEngine;
pub use manager::{FederatedSyncManager, ManagerError};
pub use origin::Origin;
pub use registry::SyncManagerRegistry;
pub use share_engine::ShareSyncEngine;
pub use storage::{SqliteStorage, SyncStorage};
