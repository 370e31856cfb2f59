//! End-to-end behavior of the coordinator through the public API.

use fedsync_service::mock::{MemoryCircles, MockSyncManager, RecordingPropagator, StaticActor};
use fedsync_service::{
    Collaborators, FederatedEvent, FederatedSyncError, LocalInstance, MemberLevel, Origin,
    SqliteStorage, SyncCoordinator, SyncStorage,
};
use serde_json::json;
use std::sync::Arc;
use sync_core::{FanOut, LockPolicy};
use sync_types::{FederatedUser, Payload, SingleId};

struct Instance {
    coordinator: Arc<SyncCoordinator>,
    storage: Arc<SqliteStorage>,
    manager: MockSyncManager,
    propagator: RecordingPropagator,
    origin: Origin,
}

async fn instance(address: &str, actor: &FederatedUser, manager: MockSyncManager) -> Instance {
    let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let circles = MemoryCircles::new();
    circles.add_member("circle-abc", actor, MemberLevel::Member);
    let propagator = RecordingPropagator::new();

    let coordinator = SyncCoordinator::new(
        storage.clone(),
        Collaborators {
            circles: Arc::new(circles),
            actors: Arc::new(StaticActor::new(actor.clone())),
            propagator: Arc::new(propagator.clone()),
        },
        LocalInstance::new(address),
        LockPolicy::default(),
    );
    coordinator.register_federated_sync_manager(Arc::new(manager.clone()));
    let origin = coordinator.set_origin("files", "folder").unwrap();

    Instance {
        coordinator: Arc::new(coordinator),
        storage,
        manager,
        propagator,
        origin,
    }
}

fn alice() -> FederatedUser {
    FederatedUser::local(SingleId::generate(), "alice")
}

async fn owner() -> Instance {
    instance("a.example.net", &alice(), MockSyncManager::new("files", "folder")).await
}

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("payload must be an object"),
    }
}

// ===========================================
// Item resolution
// ===========================================

#[tokio::test]
async fn unseen_item_is_created_once() {
    let a = owner().await;
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let first = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();

    a.coordinator
        .update_item(&a.origin, "42", &payload(json!({"name": "docs"})))
        .await
        .unwrap();
    let second = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();

    assert_eq!(first.single_id, second.single_id);
    assert!(second.is_local());
    assert_eq!(a.manager.call_count("serialize_item"), 1);
}

#[tokio::test]
async fn update_of_unknown_item_fails() {
    let a = owner().await;
    let err = a
        .coordinator
        .update_item(&a.origin, "42", &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FederatedSyncError::SyncedItemNotFound { .. }));
}

// ===========================================
// Origin binding
// ===========================================

#[tokio::test]
async fn empty_origin_fails_before_any_manager_call() {
    let a = owner().await;
    let err = a.coordinator.set_origin("", "").unwrap_err();
    assert!(matches!(err, FederatedSyncError::OriginNotBound));
    assert!(matches!(
        a.coordinator.set_origin("files", ""),
        Err(FederatedSyncError::OriginNotBound)
    ));
    assert!(a.manager.calls().is_empty());
}

#[tokio::test]
async fn unregistered_origin_has_no_manager() {
    let a = owner().await;
    let origin = a.coordinator.set_origin("calendar", "event").unwrap();
    let err = a
        .coordinator
        .create_share(&origin, "1", "circle-abc", &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FederatedSyncError::FederatedSyncManagerNotFound { .. }
    ));
}

// ===========================================
// Shares
// ===========================================

#[tokio::test]
async fn creatable_share_is_recorded_once() {
    let a = owner().await;
    let share = a
        .coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();

    let item = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();
    assert_eq!(share.single_id, item.single_id);
    assert_eq!(share.circle_id, "circle-abc");
    assert_eq!(a.storage.get_shares(&item.single_id).await.unwrap(), vec![share]);
    assert_eq!(a.manager.call_count("on_share_creation"), 1);
}

#[tokio::test]
async fn refused_share_leaves_no_rows() {
    let a = owner().await;
    a.manager.set_share_creatable(false);

    let err = a
        .coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FederatedSyncError::ShareNotCreatable { .. }));

    let item = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();
    assert!(a.storage.get_shares(&item.single_id).await.unwrap().is_empty());
    assert_eq!(a.manager.call_count("on_share_creation"), 0);
}

#[tokio::test]
async fn deleted_share_disappears_but_item_stays() {
    let a = owner().await;
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let item = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();

    a.coordinator
        .delete_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();

    let shares = a.coordinator.shares(&a.origin, "42").await.unwrap();
    assert!(shares.iter().all(|s| s.circle_id != "circle-abc"));
    let after = a.storage.get_item(&item.single_id).await.unwrap().unwrap();
    assert!(after.same_state(&item));
    assert!(!after.deleted);
}

#[tokio::test]
async fn remote_item_is_never_shared_here() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance("b.example.net", &actor, MockSyncManager::new("files", "folder")).await;

    // a's item reaches b as a mirror
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    a.coordinator
        .update_item(&a.origin, "42", &payload(json!({"name": "docs"})))
        .await
        .unwrap();
    let update = a.propagator.last_sent().unwrap();
    b.coordinator
        .apply_federated_event(1, update.event, &update.wrapper)
        .await
        .unwrap();

    let err = b
        .coordinator
        .create_share(&b.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FederatedSyncError::NotSupported(_)));
    assert_eq!(b.manager.call_count("is_share_creatable"), 0);
    assert_eq!(b.manager.call_count("on_share_creation"), 0);
}

// ===========================================
// Concurrency
// ===========================================

#[tokio::test]
async fn concurrent_updates_have_one_winner() {
    let a = owner().await;
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();

    let hold = a.manager.hold_updates();
    let coordinator = Arc::clone(&a.coordinator);
    let origin = a.origin.clone();
    let first = tokio::spawn(async move {
        coordinator
            .update_item(&origin, "42", &payload(json!({"name": "first"})))
            .await
    });

    hold.entered().await;
    let second = a
        .coordinator
        .update_item(&a.origin, "42", &payload(json!({"name": "second"})))
        .await;
    hold.release();
    let first = first.await.unwrap();

    assert!(first.is_ok());
    assert!(matches!(second, Err(FederatedSyncError::Conflict { .. })));
    assert_eq!(
        a.manager.item("42").unwrap().get("name"),
        Some(&json!("first"))
    );
}

// ===========================================
// Federation between instances
// ===========================================

#[tokio::test]
async fn repeated_item_sync_keeps_checksum() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance("b.example.net", &actor, MockSyncManager::new("files", "folder")).await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    a.coordinator
        .update_item(&a.origin, "42", &payload(json!({"name": "docs"})))
        .await
        .unwrap();
    let update = a.propagator.last_sent().unwrap();
    assert_eq!(update.event, FederatedEvent::ItemUpdated);

    let applied = b
        .coordinator
        .apply_federated_event(1, update.event, &update.wrapper)
        .await
        .unwrap();
    let first = b.coordinator.item(&b.origin, "42").await.unwrap().unwrap();
    let replayed = b
        .coordinator
        .apply_federated_event(1, update.event, &update.wrapper)
        .await
        .unwrap();
    let second = b.coordinator.item(&b.origin, "42").await.unwrap().unwrap();

    assert!(applied);
    assert!(!replayed);
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(first.instance, "a.example.net");
    assert_eq!(b.manager.call_count("sync_item"), 1);
    assert_eq!(b.manager.item("42"), a.manager.item("42"));

    let owner_item = a.coordinator.item(&a.origin, "42").await.unwrap().unwrap();
    assert_eq!(owner_item.checksum, second.checksum);
}

#[tokio::test]
async fn share_fan_out_without_full_support_skips_owner() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance("b.example.net", &actor, MockSyncManager::new("files", "folder")).await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let created = a.propagator.last_sent().unwrap();
    assert_eq!(created.event, FederatedEvent::ShareCreated);
    assert_eq!(created.scope, FanOut::RemoteOnly);

    for target in [&a, &b] {
        target
            .coordinator
            .apply_federated_event(1, created.event, &created.wrapper)
            .await
            .unwrap();
    }
    assert_eq!(a.manager.call_count("on_share_creation"), 1);
    assert_eq!(b.manager.call_count("on_share_creation"), 1);
    assert_eq!(b.coordinator.shares(&b.origin, "42").await.unwrap().len(), 1);
}

#[tokio::test]
async fn share_fan_out_with_full_support_reaches_owner() {
    let actor = alice();
    let full = || MockSyncManager::new("files", "folder").with_full_support(true);
    let a = instance("a.example.net", &actor, full()).await;
    let b = instance("b.example.net", &actor, full()).await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let created = a.propagator.last_sent().unwrap();
    assert_eq!(created.scope, FanOut::AllInstances);

    for target in [&a, &b] {
        target
            .coordinator
            .apply_federated_event(1, created.event, &created.wrapper)
            .await
            .unwrap();
    }
    assert_eq!(a.manager.call_count("on_share_creation"), 2);
    assert_eq!(b.manager.call_count("on_share_creation"), 1);
}

#[tokio::test]
async fn drifted_share_is_repaired_from_owner_details() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance("b.example.net", &actor, MockSyncManager::new("files", "folder")).await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    a.manager
        .set_share_details("42", "circle-abc", payload(json!({"permissions": 31})));

    // b never received the creation
    let details = a
        .coordinator
        .get_share_details(&a.origin, "42", "circle-abc")
        .await
        .unwrap();
    assert!(b.coordinator.sync_share(1, &details).await.unwrap());
    assert!(!b.coordinator.sync_share(1, &details).await.unwrap());

    assert_eq!(b.coordinator.shares(&b.origin, "42").await.unwrap().len(), 1);
    assert_eq!(b.manager.call_count("sync_share"), 2);
}

#[tokio::test]
async fn owner_share_rows_only_change_through_its_gates() {
    let a = owner().await;
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    a.manager.set_share_creatable(false);

    let mut forged = a
        .coordinator
        .get_share_details(&a.origin, "42", "circle-abc")
        .await
        .unwrap();
    forged.share.as_mut().unwrap().circle_id = "circle-evil".into();

    let err = a.coordinator.sync_share(1, &forged).await.unwrap_err();
    assert!(matches!(err, FederatedSyncError::NotSupported(_)));

    forged.federated_user = Some(alice());
    a.coordinator
        .apply_federated_event(1, FederatedEvent::ShareCreated, &forged)
        .await
        .unwrap();

    let shares = a.coordinator.shares(&a.origin, "42").await.unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].circle_id, "circle-abc");
}

#[tokio::test]
async fn item_deletion_cascades_everywhere() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance("b.example.net", &actor, MockSyncManager::new("files", "folder")).await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let created = a.propagator.last_sent().unwrap();
    b.coordinator
        .apply_federated_event(1, created.event, &created.wrapper)
        .await
        .unwrap();

    // only the owner may delete
    let err = b
        .coordinator
        .delete_item(&b.origin, "42", &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FederatedSyncError::NotSupported(_)));

    let deleted = a
        .coordinator
        .delete_item(&a.origin, "42", &Payload::new())
        .await
        .unwrap();
    assert!(deleted.deleted);
    assert!(a.coordinator.shares(&a.origin, "42").await.unwrap().is_empty());

    let deletion = a.propagator.last_sent().unwrap();
    assert_eq!(deletion.event, FederatedEvent::ItemDeleted);
    assert!(b
        .coordinator
        .apply_federated_event(1, deletion.event, &deletion.wrapper)
        .await
        .unwrap());
    let mirror = b.coordinator.item(&b.origin, "42").await.unwrap().unwrap();
    assert!(mirror.deleted);
    assert_eq!(mirror.single_id, deleted.single_id);
    assert!(b.coordinator.shares(&b.origin, "42").await.unwrap().is_empty());
}

#[tokio::test]
async fn old_messages_are_refused() {
    let actor = alice();
    let a = instance("a.example.net", &actor, MockSyncManager::new("files", "folder")).await;
    let b = instance(
        "b.example.net",
        &actor,
        MockSyncManager::new("files", "folder").with_version(3, 2),
    )
    .await;

    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &Payload::new())
        .await
        .unwrap();
    let created = a.propagator.last_sent().unwrap();
    assert_eq!(created.api_version, 1);

    let err = b
        .coordinator
        .apply_federated_event(created.api_version, created.event, &created.wrapper)
        .await
        .unwrap_err();
    assert!(matches!(err, FederatedSyncError::IncompatibleVersion(_)));
    assert!(b.manager.calls().is_empty());
}

#[tokio::test]
async fn wrapper_survives_the_wire() {
    let a = owner().await;
    a.coordinator
        .create_share(&a.origin, "42", "circle-abc", &payload(json!({"note": "hi"})))
        .await
        .unwrap();
    let created = a.propagator.last_sent().unwrap();

    let json = created.wrapper.to_json().unwrap();
    let decoded = sync_types::SyncedWrapper::from_json(&json).unwrap();
    assert_eq!(decoded, created.wrapper);
    assert!(decoded.has_federated_user() && decoded.has_item() && decoded.has_share());
    assert!(decoded.has_lock());
}
