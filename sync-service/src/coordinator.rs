//! Single entry point for host applications.
//!
//! Every call takes the caller's [`Origin`] explicitly. Mutating calls are
//! traced with their arguments; failures are traced and returned unchanged.

use crate::config::Config;
use crate::error::{FederatedSyncError, Result};
use crate::federation::{ActorResolver, Circle, CircleProvider, FederatedEvent, Propagator};
use crate::instance::LocalInstance;
use crate::item_engine::ItemSyncEngine;
use crate::locking::Locks;
use crate::manager::FederatedSyncManager;
use crate::origin::Origin;
use crate::registry::SyncManagerRegistry;
use crate::share_engine::{share_change, ShareSyncEngine};
use crate::storage::SyncStorage;
use std::future::Future;
use std::sync::Arc;
use sync_core::LockPolicy;
use sync_types::{FederatedUser, Payload, SyncedItem, SyncedShare, SyncedWrapper};

/// Host-server services the coordinator depends on.
#[derive(Clone)]
pub struct Collaborators {
    /// Circle lookup and membership.
    pub circles: Arc<dyn CircleProvider>,
    /// Current-user resolution.
    pub actors: Arc<dyn ActorResolver>,
    /// Cross-instance hand-off.
    pub propagator: Arc<dyn Propagator>,
}

/// Binds origin, actor and circle context and dispatches to the engines.
pub struct SyncCoordinator {
    registry: Arc<SyncManagerRegistry>,
    items: ItemSyncEngine,
    shares: ShareSyncEngine,
    circles: Arc<dyn CircleProvider>,
    actors: Arc<dyn ActorResolver>,
}

impl SyncCoordinator {
    /// Create a coordinator over `storage`.
    pub fn new(
        storage: Arc<dyn SyncStorage>,
        collaborators: Collaborators,
        instance: LocalInstance,
        lock_policy: LockPolicy,
    ) -> Self {
        let registry = Arc::new(SyncManagerRegistry::new());
        let locks = Locks::new(Arc::clone(&storage), lock_policy);
        let items = ItemSyncEngine::new(
            Arc::clone(&storage),
            Arc::clone(&registry),
            Arc::clone(&collaborators.propagator),
            locks.clone(),
            instance.clone(),
        );
        let shares = ShareSyncEngine::new(
            storage,
            Arc::clone(&registry),
            collaborators.propagator,
            locks,
            instance,
        );
        Self {
            registry,
            items,
            shares,
            circles: collaborators.circles,
            actors: collaborators.actors,
        }
    }

    /// Create a coordinator using the instance address and lock window from
    /// `config`.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn SyncStorage>,
        collaborators: Collaborators,
    ) -> Self {
        Self::new(
            storage,
            collaborators,
            LocalInstance::new(config.instance.address.clone()),
            LockPolicy::new(config.locks.stale_after()),
        )
    }

    /// Bind the caller's identity for the calls that follow.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::OriginNotBound`] if either part is empty.
    pub fn set_origin(&self, app_id: &str, item_type: &str) -> Result<Origin> {
        Origin::new(app_id, item_type)
    }

    /// Register a host-app manager. Returns whether it was stored.
    pub fn register_federated_sync_manager(&self, manager: Arc<dyn FederatedSyncManager>) -> bool {
        self.registry.register(manager)
    }

    /// The manager registry.
    pub fn registry(&self) -> &SyncManagerRegistry {
        &self.registry
    }

    /// Share `item_id` with `circle_id`, creating the synced item if needed.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::CircleNotFound`],
    /// [`FederatedSyncError::InitiatorNotFound`] when the actor is unknown
    /// or not a member, [`FederatedSyncError::NotSupported`] for items owned
    /// by another instance, [`FederatedSyncError::ShareNotCreatable`].
    pub async fn create_share(
        &self,
        origin: &Origin,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
    ) -> Result<SyncedShare> {
        self.traced(
            "create_share",
            origin,
            item_id,
            Some(circle_id),
            extra_data,
            async {
                let actor = self.member_of(circle_id).await?;
                let item = self.items.resolve_or_create(origin, item_id, true).await?;
                let item = require_local(item)?;
                self.shares
                    .create_share(&item, circle_id, extra_data, &actor)
                    .await
            },
        )
        .await
    }

    /// Modify the share of `item_id` with `circle_id`.
    pub async fn update_share(
        &self,
        origin: &Origin,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
    ) -> Result<SyncedShare> {
        self.traced(
            "update_share",
            origin,
            item_id,
            Some(circle_id),
            extra_data,
            async {
                let actor = self.member_of(circle_id).await?;
                let item = self.items.resolve_or_create(origin, item_id, false).await?;
                let item = require_local(item)?;
                self.shares
                    .update_share(&item, circle_id, extra_data, &actor)
                    .await
            },
        )
        .await
    }

    /// Remove the share of `item_id` with `circle_id`.
    pub async fn delete_share(
        &self,
        origin: &Origin,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
    ) -> Result<SyncedShare> {
        self.traced(
            "delete_share",
            origin,
            item_id,
            Some(circle_id),
            extra_data,
            async {
                let actor = self.member_of(circle_id).await?;
                let item = self.items.resolve_or_create(origin, item_id, false).await?;
                let item = require_local(item)?;
                self.shares
                    .delete_share(&item, circle_id, extra_data, &actor)
                    .await
            },
        )
        .await
    }

    /// Request an update of an already synced item.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::SyncedItemNotFound`] if the item was never
    /// synced; [`FederatedSyncError::Conflict`] while another update runs.
    pub async fn update_item(
        &self,
        origin: &Origin,
        item_id: &str,
        extra_data: &Payload,
    ) -> Result<SyncedWrapper> {
        self.traced("update_item", origin, item_id, None, extra_data, async {
            let actor = self.current_actor().await?;
            let item = self.items.resolve_or_create(origin, item_id, false).await?;
            self.items.request_update(&actor, &item, extra_data).await
        })
        .await
    }

    /// Tombstone an item owned by this instance and end its shares.
    pub async fn delete_item(
        &self,
        origin: &Origin,
        item_id: &str,
        extra_data: &Payload,
    ) -> Result<SyncedItem> {
        self.traced("delete_item", origin, item_id, None, extra_data, async {
            let actor = self.current_actor().await?;
            let item = self.items.resolve_or_create(origin, item_id, false).await?;
            self.items.delete_item(&actor, &item, extra_data).await
        })
        .await
    }

    /// Current details of a share, answered by the owning instance.
    pub async fn get_share_details(
        &self,
        origin: &Origin,
        item_id: &str,
        circle_id: &str,
    ) -> Result<SyncedWrapper> {
        let item = self.items.resolve_or_create(origin, item_id, false).await?;
        self.shares.get_share_details(&item, circle_id).await
    }

    /// Replay share details received from the owner.
    pub async fn sync_share(&self, message_version: u32, wrapper: &SyncedWrapper) -> Result<bool> {
        let result = self.shares.sync_share(message_version, wrapper).await;
        trace_inbound("sync_share", wrapper, &result);
        result
    }

    /// Apply an event propagated by another instance.
    ///
    /// Returns whether local state changed.
    pub async fn apply_federated_event(
        &self,
        message_version: u32,
        event: FederatedEvent,
        wrapper: &SyncedWrapper,
    ) -> Result<bool> {
        let result = match share_change(event) {
            Some(change) => {
                self.shares
                    .apply_remote_share_event(message_version, change, wrapper)
                    .await
            }
            None => self.items.apply_item_sync(message_version, wrapper).await,
        };
        trace_inbound("apply_federated_event", wrapper, &result);
        result
    }

    /// The synced record of `item_id`, if any.
    pub async fn item(&self, origin: &Origin, item_id: &str) -> Result<Option<SyncedItem>> {
        match self.items.resolve_or_create(origin, item_id, false).await {
            Ok(item) => Ok(Some(item)),
            Err(FederatedSyncError::SyncedItemNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Active shares of `item_id`.
    pub async fn shares(&self, origin: &Origin, item_id: &str) -> Result<Vec<SyncedShare>> {
        let item = self.items.resolve_or_create(origin, item_id, false).await?;
        self.shares.shares_of(&item).await
    }

    async fn current_actor(&self) -> Result<FederatedUser> {
        self.actors.current_actor().await.ok_or_else(|| {
            FederatedSyncError::InitiatorNotFound("no current user for this request".into())
        })
    }

    async fn member_of(&self, circle_id: &str) -> Result<FederatedUser> {
        let actor = self.current_actor().await?;
        let circle: Circle = self
            .circles
            .get_circle(circle_id, &actor)
            .await?
            .ok_or_else(|| FederatedSyncError::CircleNotFound {
                circle_id: circle_id.to_string(),
            })?;
        if !circle.initiator_is_member() {
            return Err(FederatedSyncError::InitiatorNotFound(format!(
                "{} is not a member of {}",
                actor.user_id, circle.circle_id
            )));
        }
        Ok(actor)
    }

    async fn traced<T, F>(
        &self,
        operation: &'static str,
        origin: &Origin,
        item_id: &str,
        circle_id: Option<&str>,
        extra_data: &Payload,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let extra = serde_json::to_string(extra_data).unwrap_or_default();
        tracing::debug!(
            operation,
            app_id = %origin.app_id(),
            item_type = %origin.item_type(),
            item_id,
            circle_id = circle_id.unwrap_or_default(),
            extra_data = %extra,
            "Federated sync call"
        );

        let result = call.await;
        if let Err(e) = &result {
            tracing::warn!(
                operation,
                app_id = %origin.app_id(),
                item_type = %origin.item_type(),
                item_id,
                circle_id = circle_id.unwrap_or_default(),
                error = %e,
                "Federated sync call failed"
            );
        }
        result
    }
}

fn require_local(item: SyncedItem) -> Result<SyncedItem> {
    if item.is_local() {
        Ok(item)
    } else {
        Err(FederatedSyncError::NotSupported(format!(
            "sharing item {} owned by {} is not supported",
            item.item_id, item.instance
        )))
    }
}

fn trace_inbound<T>(operation: &'static str, wrapper: &SyncedWrapper, result: &Result<T>) {
    let single_id = wrapper
        .item
        .as_ref()
        .map(|item| item.single_id.to_string())
        .unwrap_or_default();
    match result {
        Ok(_) => tracing::debug!(operation, single_id = %single_id, "Inbound federated message applied"),
        Err(e) => tracing::warn!(
            operation,
            single_id = %single_id,
            error = %e,
            "Inbound federated message rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::MemberLevel;
    use crate::mock::{MemoryCircles, MockSyncManager, RecordingPropagator, StaticActor};
    use crate::storage::SqliteStorage;

    async fn coordinator(actor: StaticActor, circles: MemoryCircles) -> SyncCoordinator {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        SyncCoordinator::from_config(
            &Config::default(),
            storage,
            Collaborators {
                circles: Arc::new(circles),
                actors: Arc::new(actor),
                propagator: Arc::new(RecordingPropagator::new()),
            },
        )
    }

    #[tokio::test]
    async fn unknown_circle_is_reported() {
        let c = coordinator(StaticActor::local("alice"), MemoryCircles::new()).await;
        c.register_federated_sync_manager(Arc::new(MockSyncManager::new("files", "folder")));
        let origin = c.set_origin("files", "folder").unwrap();

        let err = c
            .create_share(&origin, "42", "circle-abc", &Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::CircleNotFound { .. }));
    }

    #[tokio::test]
    async fn non_member_is_not_an_initiator() {
        let circles = MemoryCircles::new();
        circles.add_circle("circle-abc");
        let c = coordinator(StaticActor::local("alice"), circles).await;
        let manager = MockSyncManager::new("files", "folder");
        c.register_federated_sync_manager(Arc::new(manager.clone()));
        let origin = c.set_origin("files", "folder").unwrap();

        let err = c
            .create_share(&origin, "42", "circle-abc", &Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::InitiatorNotFound(_)));
        assert!(manager.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_actor_is_not_an_initiator() {
        let c = coordinator(StaticActor::none(), MemoryCircles::new()).await;
        let origin = c.set_origin("files", "folder").unwrap();

        let err = c
            .update_item(&origin, "42", &Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::InitiatorNotFound(_)));
    }

    #[tokio::test]
    async fn member_creates_share() {
        let actor = StaticActor::local("alice");
        let circles = MemoryCircles::new();
        circles.add_member("circle-abc", actor.actor().unwrap(), MemberLevel::Moderator);
        let c = coordinator(actor, circles).await;
        c.register_federated_sync_manager(Arc::new(MockSyncManager::new("files", "folder")));
        let origin = c.set_origin("files", "folder").unwrap();

        let share = c
            .create_share(&origin, "42", "circle-abc", &Payload::new())
            .await
            .unwrap();
        let item = c.item(&origin, "42").await.unwrap().unwrap();
        assert_eq!(share.single_id, item.single_id);
        assert_eq!(c.shares(&origin, "42").await.unwrap(), vec![share]);
    }

    #[tokio::test]
    async fn unknown_item_reads_as_none() {
        let c = coordinator(StaticActor::local("alice"), MemoryCircles::new()).await;
        let origin = c.set_origin("files", "folder").unwrap();
        assert!(c.item(&origin, "42").await.unwrap().is_none());
    }
}
