//! SyncedWrapper - the self-describing unit exchanged between instances.

use serde::{Deserialize, Serialize};

use crate::{FederatedUser, Payload, SyncedItem, SyncedItemLock, SyncedShare, WireError};

/// Transport envelope carrying any combination of actor, item, lock and
/// share, plus host-app `extra_data`.
///
/// Its JSON form is the wire envelope:
/// `{federatedUser, item, share, lock, extraData}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedWrapper {
    /// The actor that originated the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated_user: Option<FederatedUser>,
    /// The item concerned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<SyncedItem>,
    /// The share concerned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<SyncedShare>,
    /// The lock held while the event was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<SyncedItemLock>,
    /// Host-app-defined payload.
    #[serde(default)]
    pub extra_data: Payload,
}

impl SyncedWrapper {
    /// Create an empty wrapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the actor.
    pub fn with_federated_user(mut self, user: FederatedUser) -> Self {
        self.federated_user = Some(user);
        self
    }

    /// Set the item.
    pub fn with_item(mut self, item: SyncedItem) -> Self {
        self.item = Some(item);
        self
    }

    /// Set the share.
    pub fn with_share(mut self, share: SyncedShare) -> Self {
        self.share = Some(share);
        self
    }

    /// Set the lock.
    pub fn with_lock(mut self, lock: SyncedItemLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Set the host-app payload.
    pub fn with_extra_data(mut self, extra_data: Payload) -> Self {
        self.extra_data = extra_data;
        self
    }

    /// Whether an actor is present.
    pub fn has_federated_user(&self) -> bool {
        self.federated_user.is_some()
    }

    /// Whether an item is present.
    pub fn has_item(&self) -> bool {
        self.item.is_some()
    }

    /// Whether a share is present.
    pub fn has_share(&self) -> bool {
        self.share.is_some()
    }

    /// Whether a lock is present.
    pub fn has_lock(&self) -> bool {
        self.lock.is_some()
    }

    /// The item, or [`WireError::MissingPart`].
    pub fn require_item(&self) -> Result<&SyncedItem, WireError> {
        self.item.as_ref().ok_or(WireError::MissingPart("item"))
    }

    /// The share, or [`WireError::MissingPart`].
    pub fn require_share(&self) -> Result<&SyncedShare, WireError> {
        self.share.as_ref().ok_or(WireError::MissingPart("share"))
    }

    /// The actor, or [`WireError::MissingPart`].
    pub fn require_federated_user(&self) -> Result<&FederatedUser, WireError> {
        self.federated_user
            .as_ref()
            .ok_or(WireError::MissingPart("federated user"))
    }

    /// Export to the JSON wire form.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Import from the JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        serde_json::from_str(json).map_err(WireError::Deserialization)
    }
}
