//! # sync-types
//!
//! Synchronized entity types for the fedsync federated share protocol.
//!
//! This crate provides the data records every fedsync crate exchanges:
//! - [`SingleId`] - Federation-wide identifier
//! - [`FederatedUser`] - The actor behind a request
//! - [`SyncedItem`], [`SyncedShare`], [`SyncedItemLock`] - Persisted entities
//! - [`SyncedWrapper`] - Self-describing envelope for cross-instance exchange
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod actor;
mod error;
mod ids;
mod item;
mod lock;
mod share;
mod wrapper;

pub use actor::FederatedUser;
pub use error::WireError;
pub use ids::{SingleId, SINGLE_ID_LENGTH};
pub use item::SyncedItem;
pub use lock::{LockType, SyncedItemLock};
pub use share::SyncedShare;
pub use wrapper::SyncedWrapper;

/// Opaque host-app payload: serialized item state or `extraData`.
///
/// Keys are kept sorted, so two payloads with the same content always
/// serialize to the same bytes.
pub type Payload = serde_json::Map<String, serde_json::Value>;
