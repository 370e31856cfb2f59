//! Share creation, modification and deletion, on the owner and on
//! receiving instances.
//!
//! The owner evaluates the manager's gate, feeds the answer to the
//! [`ShareState`] machine and executes the returned actions under the
//! `share` lock. If a callback fails after the row was written, the row
//! change is undone so no share survives without a completed creation.

use crate::error::{FederatedSyncError, Result};
use crate::federation::{FederatedEvent, Propagation, Propagator};
use crate::instance::LocalInstance;
use crate::item_engine::mirror_item;
use crate::locking::Locks;
use crate::manager::FederatedSyncManager;
use crate::registry::SyncManagerRegistry;
use crate::storage::SyncStorage;
use std::sync::Arc;
use sync_core::{FanOut, ShareAction, ShareChange, ShareEvent, ShareRejection, ShareState};
use sync_types::{
    FederatedUser, LockType, Payload, SyncedItem, SyncedItemLock, SyncedShare, SyncedWrapper,
    WireError,
};

/// A share operation requested on the owning instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShareOp {
    Create,
    Update,
    Delete,
}

/// Drives the lifecycle of [`SyncedShare`]s.
#[derive(Clone)]
pub struct ShareSyncEngine {
    storage: Arc<dyn SyncStorage>,
    registry: Arc<SyncManagerRegistry>,
    propagator: Arc<dyn Propagator>,
    locks: Locks,
    instance: LocalInstance,
}

impl ShareSyncEngine {
    /// Create an engine.
    pub fn new(
        storage: Arc<dyn SyncStorage>,
        registry: Arc<SyncManagerRegistry>,
        propagator: Arc<dyn Propagator>,
        locks: Locks,
        instance: LocalInstance,
    ) -> Self {
        Self {
            storage,
            registry,
            propagator,
            locks,
            instance,
        }
    }

    /// Share a local item with a circle.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::ShareNotCreatable`] when the manager refuses,
    /// with no share written.
    pub async fn create_share(
        &self,
        item: &SyncedItem,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<SyncedShare> {
        self.run(ShareOp::Create, item, circle_id, extra_data, actor)
            .await
    }

    /// Modify an existing share of a local item.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::ShareNotFound`] if the share does not exist;
    /// [`FederatedSyncError::ShareNotModifiable`] when the manager refuses.
    pub async fn update_share(
        &self,
        item: &SyncedItem,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<SyncedShare> {
        self.run(ShareOp::Update, item, circle_id, extra_data, actor)
            .await
    }

    /// Remove a share of a local item.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::ShareNotDeletable`] when the manager refuses.
    pub async fn delete_share(
        &self,
        item: &SyncedItem,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<SyncedShare> {
        self.run(ShareOp::Delete, item, circle_id, extra_data, actor)
            .await
    }

    async fn run(
        &self,
        op: ShareOp,
        item: &SyncedItem,
        circle_id: &str,
        extra_data: &Payload,
        actor: &FederatedUser,
    ) -> Result<SyncedShare> {
        if !item.is_local() {
            return Err(remote_item(item));
        }
        if item.deleted {
            return Err(FederatedSyncError::SyncedItemNotFound {
                app_id: item.app_id.clone(),
                item_type: item.item_type.clone(),
                item_id: item.item_id.clone(),
            });
        }
        let manager = self.registry.lookup(&item.app_id, &item.item_type)?;
        let share = SyncedShare::new(item.single_id.clone(), circle_id);
        let lock = self
            .locks
            .acquire(LockType::Share, &share_lock_id(&share))
            .await?;

        let result = self
            .run_locked(op, manager.as_ref(), item, &share, extra_data, actor, &lock)
            .await;
        self.locks.release(&lock, result).await.map(|()| share)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_locked(
        &self,
        op: ShareOp,
        manager: &dyn FederatedSyncManager,
        item: &SyncedItem,
        share: &SyncedShare,
        extra_data: &Payload,
        actor: &FederatedUser,
        lock: &SyncedItemLock,
    ) -> Result<()> {
        let exists = self
            .storage
            .get_share(&share.single_id, &share.circle_id)
            .await?
            .is_some();
        let state = ShareState::from_exists(exists);

        let event = match op {
            ShareOp::Create => ShareEvent::Create {
                permitted: manager
                    .is_share_creatable(&item.item_id, &share.circle_id, extra_data, actor)
                    .await?,
            },
            // Modifying a missing share is refused without asking the manager.
            ShareOp::Update if !state.is_active() => ShareEvent::Update { permitted: false },
            ShareOp::Update => ShareEvent::Update {
                permitted: manager
                    .is_share_modifiable(&item.item_id, &share.circle_id, extra_data, actor)
                    .await?,
            },
            ShareOp::Delete => ShareEvent::Delete {
                permitted: manager
                    .is_share_deletable(&item.item_id, &share.circle_id, extra_data, actor)
                    .await?,
            },
        };

        let (next, actions) = state.on_event(event);
        tracing::debug!(
            single_id = %share.single_id,
            circle_id = %share.circle_id,
            from = ?state,
            to = ?next,
            ?actions,
            "Share transition"
        );

        let mut undo: Option<ShareAction> = None;
        for action in actions {
            let step = match action {
                ShareAction::PersistShare => {
                    if self.storage.insert_share(share).await? {
                        undo = Some(ShareAction::RemoveShare);
                    }
                    Ok(())
                }
                ShareAction::RemoveShare => {
                    if self.storage.delete_share(share).await? {
                        undo = Some(ShareAction::PersistShare);
                    }
                    Ok(())
                }
                ShareAction::Notify(change) => {
                    notify(manager, change, &item.item_id, &share.circle_id, extra_data, actor)
                        .await
                }
                ShareAction::Propagate(change) => {
                    let wrapper = SyncedWrapper::new()
                        .with_federated_user(actor.clone())
                        .with_item(self.instance.export_item(item))
                        .with_share(share.clone())
                        .with_lock(lock.clone())
                        .with_extra_data(extra_data.clone());
                    self.propagator
                        .propagate(Propagation {
                            event: share_event(change),
                            scope: FanOut::for_manager(manager.is_full_support()),
                            api_version: manager.api_version(),
                            wrapper,
                        })
                        .await
                }
                ShareAction::Reject(rejection) => Err(rejected(rejection, item, share)),
            };

            if let Err(e) = step {
                if let Some(compensation) = undo.take() {
                    self.compensate(compensation, share).await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn compensate(&self, action: ShareAction, share: &SyncedShare) {
        let result = match action {
            ShareAction::RemoveShare => self.storage.delete_share(share).await,
            ShareAction::PersistShare => self.storage.insert_share(share).await,
            _ => return,
        };
        match result {
            Ok(_) => tracing::warn!(
                single_id = %share.single_id,
                circle_id = %share.circle_id,
                ?action,
                "Share change rolled back"
            ),
            Err(e) => tracing::error!(
                single_id = %share.single_id,
                circle_id = %share.circle_id,
                error = %e,
                "Failed to roll back share change"
            ),
        }
    }

    /// Current details of a share of a local item, for a drift check by
    /// another instance.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::NotSupported`] for items owned elsewhere;
    /// [`FederatedSyncError::ShareNotFound`] if the item is not shared with
    /// the circle.
    pub async fn get_share_details(
        &self,
        item: &SyncedItem,
        circle_id: &str,
    ) -> Result<SyncedWrapper> {
        if !item.is_local() {
            return Err(remote_item(item));
        }
        let manager = self.registry.lookup(&item.app_id, &item.item_type)?;
        let share = self
            .storage
            .get_share(&item.single_id, circle_id)
            .await?
            .ok_or_else(|| FederatedSyncError::ShareNotFound {
                item_id: item.item_id.clone(),
                circle_id: circle_id.to_string(),
            })?;

        let details = manager.get_share_details(&item.item_id, circle_id).await?;
        Ok(SyncedWrapper::new()
            .with_item(self.instance.export_item(item))
            .with_share(share)
            .with_extra_data(details))
    }

    /// Replay share details obtained from the owner.
    ///
    /// Makes sure the item and share are recorded locally, then hands the
    /// details to the manager. Safe to repeat; returns whether the share row
    /// was missing.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::NotSupported`] if this instance owns the item;
    /// the owner's share rows only change through its own gates.
    pub async fn sync_share(&self, message_version: u32, wrapper: &SyncedWrapper) -> Result<bool> {
        let Some((manager, stored, share)) = self.inbound(message_version, wrapper).await? else {
            return Ok(false);
        };
        if stored.is_local() {
            return Err(FederatedSyncError::NotSupported(format!(
                "item {} is owned here; share details are replayed on receiving instances",
                stored.item_id
            )));
        }

        let repaired = self.storage.insert_share(share).await?;
        manager
            .sync_share(&stored.item_id, &share.circle_id, &wrapper.extra_data)
            .await?;
        if repaired {
            tracing::info!(
                single_id = %share.single_id,
                circle_id = %share.circle_id,
                "Repaired missing share"
            );
        }
        Ok(repaired)
    }

    /// Apply a share change propagated by the owning instance.
    ///
    /// Returns whether the local share rows changed. The manager callback
    /// runs on every delivery unless this is the owner and the manager is
    /// not full-support.
    pub async fn apply_remote_share_event(
        &self,
        message_version: u32,
        change: ShareChange,
        wrapper: &SyncedWrapper,
    ) -> Result<bool> {
        let actor = wrapper.require_federated_user()?;
        let Some((manager, stored, share)) = self.inbound(message_version, wrapper).await? else {
            return Ok(false);
        };

        // The owner already wrote its row before propagating.
        let changed = match (change, stored.is_local()) {
            (_, true) | (ShareChange::Modified, _) => false,
            (ShareChange::Created, false) => self.storage.insert_share(share).await?,
            (ShareChange::Deleted, false) => self.storage.delete_share(share).await?,
        };

        let scope = FanOut::for_manager(manager.is_full_support());
        if scope.applies_to(stored.is_local()) {
            notify(
                manager.as_ref(),
                change,
                &stored.item_id,
                &share.circle_id,
                &wrapper.extra_data,
                actor,
            )
            .await?;
        }

        tracing::debug!(
            single_id = %share.single_id,
            circle_id = %share.circle_id,
            ?change,
            changed,
            "Applied remote share event"
        );
        Ok(changed)
    }

    /// Manager, stored item and share of an inbound share message, or
    /// `None` if the item is tombstoned here.
    async fn inbound<'w>(
        &self,
        message_version: u32,
        wrapper: &'w SyncedWrapper,
    ) -> Result<Option<(Arc<dyn FederatedSyncManager>, SyncedItem, &'w SyncedShare)>> {
        let incoming = self.instance.import_item(wrapper.require_item()?);
        let share = wrapper.require_share()?;
        if share.single_id != incoming.single_id {
            return Err(WireError::ShareItemMismatch {
                item: incoming.single_id.to_string(),
                share: share.single_id.to_string(),
            }
            .into());
        }
        let manager = self.registry.lookup_compatible(
            &incoming.app_id,
            &incoming.item_type,
            message_version,
        )?;
        let stored = mirror_item(self.storage.as_ref(), &incoming).await?;
        if stored.deleted {
            tracing::debug!(single_id = %stored.single_id, "Ignoring share message for tombstoned item");
            return Ok(None);
        }
        Ok(Some((manager, stored, share)))
    }

    /// All shares of an item.
    pub async fn shares_of(&self, item: &SyncedItem) -> Result<Vec<SyncedShare>> {
        Ok(self.storage.get_shares(&item.single_id).await?)
    }
}

async fn notify(
    manager: &dyn FederatedSyncManager,
    change: ShareChange,
    item_id: &str,
    circle_id: &str,
    extra_data: &Payload,
    actor: &FederatedUser,
) -> Result<()> {
    match change {
        ShareChange::Created => {
            manager
                .on_share_creation(item_id, circle_id, extra_data, actor)
                .await?
        }
        ShareChange::Modified => {
            manager
                .on_share_modification(item_id, circle_id, extra_data, actor)
                .await?
        }
        ShareChange::Deleted => {
            manager
                .on_share_deletion(item_id, circle_id, extra_data, actor)
                .await?
        }
    }
    Ok(())
}

fn share_event(change: ShareChange) -> FederatedEvent {
    match change {
        ShareChange::Created => FederatedEvent::ShareCreated,
        ShareChange::Modified => FederatedEvent::ShareModified,
        ShareChange::Deleted => FederatedEvent::ShareDeleted,
    }
}

/// The [`ShareChange`] a propagated share event carries, if any.
pub fn share_change(event: FederatedEvent) -> Option<ShareChange> {
    match event {
        FederatedEvent::ShareCreated => Some(ShareChange::Created),
        FederatedEvent::ShareModified => Some(ShareChange::Modified),
        FederatedEvent::ShareDeleted => Some(ShareChange::Deleted),
        FederatedEvent::ItemUpdated | FederatedEvent::ItemDeleted => None,
    }
}

fn rejected(rejection: ShareRejection, item: &SyncedItem, share: &SyncedShare) -> FederatedSyncError {
    let item_id = item.item_id.clone();
    let circle_id = share.circle_id.clone();
    match rejection {
        ShareRejection::NotCreatable => FederatedSyncError::ShareNotCreatable { item_id, circle_id },
        ShareRejection::NotModifiable => {
            FederatedSyncError::ShareNotModifiable { item_id, circle_id }
        }
        ShareRejection::NotDeletable => FederatedSyncError::ShareNotDeletable { item_id, circle_id },
        ShareRejection::NotFound => FederatedSyncError::ShareNotFound { item_id, circle_id },
    }
}

fn remote_item(item: &SyncedItem) -> FederatedSyncError {
    FederatedSyncError::NotSupported(format!(
        "item {} is owned by {}; shares are originated by the owning instance",
        item.item_id, item.instance
    ))
}

fn share_lock_id(share: &SyncedShare) -> String {
    format!("{}:{}", share.single_id, share.circle_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSyncManager, RecordingPropagator};
    use crate::storage::SqliteStorage;
    use serde_json::json;
    use sync_core::LockPolicy;
    use sync_types::SingleId;

    struct Fixture {
        engine: ShareSyncEngine,
        storage: Arc<SqliteStorage>,
        manager: MockSyncManager,
        propagator: RecordingPropagator,
        item: SyncedItem,
    }

    async fn fixture_with(manager: MockSyncManager) -> Fixture {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let registry = Arc::new(SyncManagerRegistry::new());
        registry.register(Arc::new(manager.clone()));
        let propagator = RecordingPropagator::new();
        let engine = ShareSyncEngine::new(
            storage.clone(),
            registry,
            Arc::new(propagator.clone()),
            Locks::new(storage.clone(), LockPolicy::default()),
            LocalInstance::new("a.example.net"),
        );
        let item = SyncedItem::new_local(SingleId::generate(), "files", "folder", "42", "sum");
        storage.insert_item(&item).await.unwrap();
        Fixture {
            engine,
            storage,
            manager,
            propagator,
            item,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(MockSyncManager::new("files", "folder")).await
    }

    fn actor() -> FederatedUser {
        FederatedUser::local(SingleId::generate(), "alice")
    }

    #[tokio::test]
    async fn create_persists_notifies_and_propagates() {
        let f = fixture().await;
        let share = f
            .engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();

        assert_eq!(f.engine.shares_of(&f.item).await.unwrap(), vec![share]);
        assert_eq!(f.manager.call_count("on_share_creation"), 1);

        let propagation = f.propagator.last_sent().unwrap();
        assert_eq!(propagation.event, FederatedEvent::ShareCreated);
        assert_eq!(propagation.scope, FanOut::RemoteOnly);
        assert_eq!(
            propagation.wrapper.item.unwrap().instance,
            "a.example.net"
        );
    }

    #[tokio::test]
    async fn refused_creation_leaves_nothing() {
        let f = fixture().await;
        f.manager.set_share_creatable(false);

        let err = f
            .engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::ShareNotCreatable { .. }));
        assert!(f.engine.shares_of(&f.item).await.unwrap().is_empty());
        assert_eq!(f.manager.call_count("on_share_creation"), 0);
        assert!(f.propagator.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_callback_rolls_back_row() {
        let f = fixture().await;
        f.manager.fail_next_callback("host down");

        let err = f
            .engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::Manager(_)));
        assert!(f.engine.shares_of(&f.item).await.unwrap().is_empty());

        // a retry goes through the full creation again
        f.engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();
        assert_eq!(f.manager.call_count("on_share_creation"), 2);
        assert_eq!(f.engine.shares_of(&f.item).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replayed_creation_only_repropagates() {
        let f = fixture().await;
        for _ in 0..2 {
            f.engine
                .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
                .await
                .unwrap();
        }
        assert_eq!(f.manager.call_count("on_share_creation"), 1);
        assert_eq!(f.propagator.sent().len(), 2);
        assert_eq!(f.engine.shares_of(&f.item).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_lifecycle() {
        let f = fixture().await;
        let alice = actor();
        let err = f
            .engine
            .update_share(&f.item, "circle-abc", &Payload::new(), &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::ShareNotFound { .. }));
        assert_eq!(f.manager.call_count("is_share_modifiable"), 0);

        f.engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &alice)
            .await
            .unwrap();
        f.engine
            .update_share(&f.item, "circle-abc", &Payload::new(), &alice)
            .await
            .unwrap();
        assert_eq!(f.manager.call_count("on_share_modification"), 1);

        f.manager.set_share_deletable(false);
        let err = f
            .engine
            .delete_share(&f.item, "circle-abc", &Payload::new(), &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::ShareNotDeletable { .. }));
        assert_eq!(f.engine.shares_of(&f.item).await.unwrap().len(), 1);

        f.manager.set_share_deletable(true);
        f.engine
            .delete_share(&f.item, "circle-abc", &Payload::new(), &alice)
            .await
            .unwrap();
        assert!(f.engine.shares_of(&f.item).await.unwrap().is_empty());
        assert_eq!(f.manager.call_count("on_share_deletion"), 1);
        assert!(f.storage.get_item(&f.item.single_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn only_live_local_items_are_shared() {
        let f = fixture().await;
        let mut remote = f.item.clone();
        remote.instance = "b.example.net".into();

        let err = f
            .engine
            .create_share(&remote, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::NotSupported(_)));
        assert_eq!(f.manager.call_count("is_share_creatable"), 0);

        f.storage.tombstone_item(&f.item.single_id).await.unwrap();
        let tombstone = f.storage.get_item(&f.item.single_id).await.unwrap().unwrap();

        let err = f
            .engine
            .create_share(&tombstone, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::SyncedItemNotFound { .. }));
        assert!(f.engine.shares_of(&tombstone).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn share_details_round_trip() {
        let f = fixture().await;
        f.engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();
        let mut details = Payload::new();
        details.insert("permissions".into(), json!(31));
        f.manager.set_share_details("42", "circle-abc", details.clone());

        let wrapper = f
            .engine
            .get_share_details(&f.item, "circle-abc")
            .await
            .unwrap();
        assert_eq!(wrapper.extra_data, details);
        assert!(wrapper.has_share());

        let err = f
            .engine
            .get_share_details(&f.item, "circle-xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, FederatedSyncError::ShareNotFound { .. }));
    }

    fn remote_share_wrapper(single_id: &SingleId) -> SyncedWrapper {
        let mut item = SyncedItem::new_local(single_id.clone(), "files", "folder", "7", "x");
        item.instance = "b.example.net".into();
        SyncedWrapper::new()
            .with_federated_user(actor())
            .with_item(item)
            .with_share(SyncedShare::new(single_id.clone(), "circle-abc"))
    }

    #[tokio::test]
    async fn sync_share_repairs_missing_row_once() {
        let f = fixture().await;
        let single_id = SingleId::generate();
        let wrapper = remote_share_wrapper(&single_id);

        assert!(f.engine.sync_share(1, &wrapper).await.unwrap());
        assert!(!f.engine.sync_share(1, &wrapper).await.unwrap());
        assert_eq!(f.storage.get_shares(&single_id).await.unwrap().len(), 1);
        assert_eq!(f.manager.call_count("sync_share"), 2);
    }

    #[tokio::test]
    async fn owner_refuses_replayed_share_details() {
        let f = fixture().await;
        f.engine
            .create_share(&f.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();
        f.manager.set_share_creatable(false);

        let forged = SyncedWrapper::new()
            .with_item(f.engine.instance.export_item(&f.item))
            .with_share(SyncedShare::new(f.item.single_id.clone(), "circle-evil"));
        let err = f.engine.sync_share(1, &forged).await.unwrap_err();

        assert!(matches!(err, FederatedSyncError::NotSupported(_)));
        let circles: Vec<_> = f
            .engine
            .shares_of(&f.item)
            .await
            .unwrap()
            .into_iter()
            .map(|share| share.circle_id)
            .collect();
        assert_eq!(circles, vec!["circle-abc".to_string()]);
        assert_eq!(f.manager.call_count("is_share_creatable"), 1);
        assert_eq!(f.manager.call_count("sync_share"), 0);
    }

    #[tokio::test]
    async fn share_naming_another_item_is_refused() {
        let f = fixture().await;
        let foreign = SingleId::generate();
        let wrapper = remote_share_wrapper(&foreign)
            .with_share(SyncedShare::new(f.item.single_id.clone(), "circle-evil2"));

        let err = f
            .engine
            .apply_remote_share_event(1, ShareChange::Created, &wrapper)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FederatedSyncError::Wire(WireError::ShareItemMismatch { .. })
        ));
        let err = f.engine.sync_share(1, &wrapper).await.unwrap_err();
        assert!(matches!(
            err,
            FederatedSyncError::Wire(WireError::ShareItemMismatch { .. })
        ));

        assert!(f.engine.shares_of(&f.item).await.unwrap().is_empty());
        assert!(f.storage.get_item(&foreign).await.unwrap().is_none());
        assert_eq!(f.manager.call_count("on_share_creation"), 0);
    }

    #[tokio::test]
    async fn remote_creation_and_deletion_are_mirrored() {
        let f = fixture().await;
        let single_id = SingleId::generate();
        let wrapper = remote_share_wrapper(&single_id);

        assert!(f
            .engine
            .apply_remote_share_event(1, ShareChange::Created, &wrapper)
            .await
            .unwrap());
        assert!(!f
            .engine
            .apply_remote_share_event(1, ShareChange::Created, &wrapper)
            .await
            .unwrap());
        assert_eq!(f.storage.get_shares(&single_id).await.unwrap().len(), 1);
        assert_eq!(f.manager.call_count("on_share_creation"), 2);

        assert!(f
            .engine
            .apply_remote_share_event(1, ShareChange::Deleted, &wrapper)
            .await
            .unwrap());
        assert!(f.storage.get_shares(&single_id).await.unwrap().is_empty());

        let mirrored = f.storage.get_item(&single_id).await.unwrap().unwrap();
        assert_eq!(mirrored.instance, "b.example.net");
    }

    #[tokio::test]
    async fn owner_echo_respects_full_support() {
        let partial = fixture().await;
        partial
            .engine
            .create_share(&partial.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();
        let echo = partial.propagator.last_sent().unwrap().wrapper;
        partial
            .engine
            .apply_remote_share_event(1, ShareChange::Created, &echo)
            .await
            .unwrap();
        assert_eq!(partial.manager.call_count("on_share_creation"), 1);

        let full = fixture_with(MockSyncManager::new("files", "folder").with_full_support(true)).await;
        full.engine
            .create_share(&full.item, "circle-abc", &Payload::new(), &actor())
            .await
            .unwrap();
        let propagation = full.propagator.last_sent().unwrap();
        assert_eq!(propagation.scope, FanOut::AllInstances);
        full.engine
            .apply_remote_share_event(1, ShareChange::Created, &propagation.wrapper)
            .await
            .unwrap();
        assert_eq!(full.manager.call_count("on_share_creation"), 2);
    }

    #[test]
    fn share_change_mapping() {
        assert_eq!(
            share_change(FederatedEvent::ShareDeleted),
            Some(ShareChange::Deleted)
        );
        assert_eq!(share_change(FederatedEvent::ItemUpdated), None);
        for change in [ShareChange::Created, ShareChange::Modified, ShareChange::Deleted] {
            assert_eq!(share_change(share_event(change)), Some(change));
        }
    }
}
