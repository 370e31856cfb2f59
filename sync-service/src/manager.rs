//! The contract host applications implement to plug an item type into
//! federated sync.

use async_trait::async_trait;
use sync_core::ApiCompatibility;
use sync_types::{FederatedUser, Payload};
use thiserror::Error;

/// Errors raised by host-app callbacks.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The host app does not know the item.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// The host app vetoed the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other host-app failure.
    #[error("{0}")]
    Other(String),
}

/// One item type of one host application, as seen by the sync protocol.
///
/// Every callback may be delivered more than once, in any order, and must
/// be idempotent for a repeated payload.
#[async_trait]
pub trait FederatedSyncManager: Send + Sync {
    /// Host application id, e.g. `"files"`.
    fn app_id(&self) -> &str;

    /// Item type within the application, e.g. `"folder"`.
    fn item_type(&self) -> &str;

    /// Version of the messages this manager produces.
    fn api_version(&self) -> u32;

    /// Lowest message version this manager accepts.
    fn api_lower_back_compatibility(&self) -> u32;

    /// Whether share callbacks are re-run on the owning instance when the
    /// share event fans out.
    fn is_full_support(&self) -> bool;

    /// Both version numbers together.
    fn compatibility(&self) -> ApiCompatibility {
        ApiCompatibility::new(self.api_version(), self.api_lower_back_compatibility())
    }

    /// Serialize the current state of an item.
    async fn serialize_item(&self, item_id: &str) -> Result<Payload, ManagerError>;

    /// Apply serialized state received for an item.
    async fn sync_item(&self, item_id: &str, serialized: &Payload) -> Result<(), ManagerError>;

    /// Current details of a share, as known by the owner.
    async fn get_share_details(
        &self,
        item_id: &str,
        circle_id: &str,
    ) -> Result<Payload, ManagerError>;

    /// Replay share details to repair a diverged local copy.
    async fn sync_share(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
    ) -> Result<(), ManagerError>;

    /// Owner-side gate for share creation.
    async fn is_share_creatable(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<bool, ManagerError>;

    /// A share was created.
    async fn on_share_creation(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<(), ManagerError>;

    /// Owner-side gate for share modification.
    async fn is_share_modifiable(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<bool, ManagerError>;

    /// A share was modified.
    async fn on_share_modification(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<(), ManagerError>;

    /// Owner-side gate for share deletion.
    async fn is_share_deletable(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<bool, ManagerError>;

    /// A share was deleted.
    async fn on_share_deletion(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<(), ManagerError>;

    /// Gate for an item update.
    ///
    /// Returns the prospective serialized state the item will have once the
    /// update is applied; an error vetoes the update.
    async fn is_item_updatable(
        &self,
        item_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<Payload, ManagerError>;
}
