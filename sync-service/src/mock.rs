//! Test doubles for host applications and integration tests.
//!
//! All doubles are cheap to clone; clones share state, so a test can keep a
//! handle while the coordinator owns another.

use crate::error::{FederatedSyncError, Result};
use crate::federation::{
    ActorResolver, Circle, CircleProvider, MemberLevel, Propagation, Propagator,
};
use crate::manager::{FederatedSyncManager, ManagerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_types::{FederatedUser, Payload, SingleId};
use tokio::sync::Notify;

/// One recorded manager callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerCall {
    /// Callback name, e.g. `"on_share_creation"`.
    pub method: &'static str,
    /// Item the callback was for.
    pub item_id: String,
    /// Circle, for share callbacks.
    pub circle_id: Option<String>,
}

/// Parks `is_item_updatable` until released.
#[derive(Debug, Default)]
pub struct UpdateHold {
    entered: Notify,
    released: Notify,
}

impl UpdateHold {
    /// Wait until an update is parked inside `is_item_updatable`.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked update continue.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// Scriptable [`FederatedSyncManager`].
///
/// Items live in an in-memory map: `serialize_item` returns the stored
/// payload (or `{"itemId": ..}` for unknown items), `sync_item` replaces it,
/// and `is_item_updatable` returns the stored payload with `extra_data`
/// merged over it. All gates answer `true` until told otherwise.
#[derive(Debug, Clone)]
pub struct MockSyncManager {
    app_id: String,
    item_type: String,
    version: u32,
    lower_back_compatibility: u32,
    full_support: bool,
    inner: Arc<Mutex<MockManagerInner>>,
}

#[derive(Debug)]
struct MockManagerInner {
    items: HashMap<String, Payload>,
    share_details: HashMap<(String, String), Payload>,
    creatable: bool,
    modifiable: bool,
    deletable: bool,
    reject_updates: Option<String>,
    fail_next_callback: Option<String>,
    update_hold: Option<Arc<UpdateHold>>,
    calls: Vec<ManagerCall>,
}

impl Default for MockManagerInner {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            share_details: HashMap::new(),
            creatable: true,
            modifiable: true,
            deletable: true,
            reject_updates: None,
            fail_next_callback: None,
            update_hold: None,
            calls: Vec::new(),
        }
    }
}

impl MockSyncManager {
    /// Create a manager for `(app_id, item_type)` at API version 1.
    pub fn new(app_id: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            item_type: item_type.into(),
            version: 1,
            lower_back_compatibility: 1,
            full_support: false,
            inner: Arc::default(),
        }
    }

    /// Set the API version and compatibility floor.
    pub fn with_version(mut self, version: u32, lower_back_compatibility: u32) -> Self {
        self.version = version;
        self.lower_back_compatibility = lower_back_compatibility;
        self
    }

    /// Set `is_full_support`.
    pub fn with_full_support(mut self, full_support: bool) -> Self {
        self.full_support = full_support;
        self
    }

    /// Store the host-app state of an item.
    pub fn set_item(&self, item_id: &str, payload: Payload) {
        self.inner
            .lock()
            .unwrap()
            .items
            .insert(item_id.to_string(), payload);
    }

    /// Current host-app state of an item.
    pub fn item(&self, item_id: &str) -> Option<Payload> {
        self.inner.lock().unwrap().items.get(item_id).cloned()
    }

    /// Set what `get_share_details` returns for a share.
    pub fn set_share_details(&self, item_id: &str, circle_id: &str, details: Payload) {
        self.inner
            .lock()
            .unwrap()
            .share_details
            .insert((item_id.to_string(), circle_id.to_string()), details);
    }

    /// Answer of `is_share_creatable`.
    pub fn set_share_creatable(&self, creatable: bool) {
        self.inner.lock().unwrap().creatable = creatable;
    }

    /// Answer of `is_share_modifiable`.
    pub fn set_share_modifiable(&self, modifiable: bool) {
        self.inner.lock().unwrap().modifiable = modifiable;
    }

    /// Answer of `is_share_deletable`.
    pub fn set_share_deletable(&self, deletable: bool) {
        self.inner.lock().unwrap().deletable = deletable;
    }

    /// Make `is_item_updatable` veto with `reason`.
    pub fn reject_updates(&self, reason: &str) {
        self.inner.lock().unwrap().reject_updates = Some(reason.to_string());
    }

    /// Make the next `on_share_*` callback fail.
    pub fn fail_next_callback(&self, reason: &str) {
        self.inner.lock().unwrap().fail_next_callback = Some(reason.to_string());
    }

    /// Park every `is_item_updatable` call until the returned hold releases it.
    pub fn hold_updates(&self) -> Arc<UpdateHold> {
        let hold = Arc::new(UpdateHold::default());
        self.inner.lock().unwrap().update_hold = Some(Arc::clone(&hold));
        hold
    }

    /// All recorded callbacks, oldest first.
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn record(&self, method: &'static str, item_id: &str, circle_id: Option<&str>) {
        self.inner.lock().unwrap().calls.push(ManagerCall {
            method,
            item_id: item_id.to_string(),
            circle_id: circle_id.map(str::to_string),
        });
    }

    fn gate(&self, method: &'static str, item_id: &str, circle_id: &str) -> bool {
        self.record(method, item_id, Some(circle_id));
        let inner = self.inner.lock().unwrap();
        match method {
            "is_share_creatable" => inner.creatable,
            "is_share_modifiable" => inner.modifiable,
            _ => inner.deletable,
        }
    }

    fn callback(
        &self,
        method: &'static str,
        item_id: &str,
        circle_id: &str,
    ) -> std::result::Result<(), ManagerError> {
        self.record(method, item_id, Some(circle_id));
        match self.inner.lock().unwrap().fail_next_callback.take() {
            Some(reason) => Err(ManagerError::Other(reason)),
            None => Ok(()),
        }
    }

    fn current_state(&self, item_id: &str) -> Payload {
        self.item(item_id).unwrap_or_else(|| {
            let mut payload = Payload::new();
            payload.insert("itemId".into(), item_id.into());
            payload
        })
    }
}

#[async_trait]
impl FederatedSyncManager for MockSyncManager {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn api_version(&self) -> u32 {
        self.version
    }

    fn api_lower_back_compatibility(&self) -> u32 {
        self.lower_back_compatibility
    }

    fn is_full_support(&self) -> bool {
        self.full_support
    }

    async fn serialize_item(&self, item_id: &str) -> std::result::Result<Payload, ManagerError> {
        self.record("serialize_item", item_id, None);
        Ok(self.current_state(item_id))
    }

    async fn sync_item(
        &self,
        item_id: &str,
        serialized: &Payload,
    ) -> std::result::Result<(), ManagerError> {
        self.record("sync_item", item_id, None);
        self.set_item(item_id, serialized.clone());
        Ok(())
    }

    async fn get_share_details(
        &self,
        item_id: &str,
        circle_id: &str,
    ) -> std::result::Result<Payload, ManagerError> {
        self.record("get_share_details", item_id, Some(circle_id));
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .share_details
            .get(&(item_id.to_string(), circle_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn sync_share(
        &self,
        item_id: &str,
        circle_id: &str,
        extra_data: &Payload,
    ) -> std::result::Result<(), ManagerError> {
        self.record("sync_share", item_id, Some(circle_id));
        self.set_share_details(item_id, circle_id, extra_data.clone());
        Ok(())
    }

    async fn is_share_creatable(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<bool, ManagerError> {
        Ok(self.gate("is_share_creatable", item_id, circle_id))
    }

    async fn on_share_creation(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<(), ManagerError> {
        self.callback("on_share_creation", item_id, circle_id)
    }

    async fn is_share_modifiable(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<bool, ManagerError> {
        Ok(self.gate("is_share_modifiable", item_id, circle_id))
    }

    async fn on_share_modification(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<(), ManagerError> {
        self.callback("on_share_modification", item_id, circle_id)
    }

    async fn is_share_deletable(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<bool, ManagerError> {
        Ok(self.gate("is_share_deletable", item_id, circle_id))
    }

    async fn on_share_deletion(
        &self,
        item_id: &str,
        circle_id: &str,
        _extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<(), ManagerError> {
        self.callback("on_share_deletion", item_id, circle_id)
    }

    async fn is_item_updatable(
        &self,
        item_id: &str,
        extra_data: &Payload,
        _actor: &FederatedUser,
    ) -> std::result::Result<Payload, ManagerError> {
        self.record("is_item_updatable", item_id, None);

        let (hold, rejection) = {
            let inner = self.inner.lock().unwrap();
            (inner.update_hold.clone(), inner.reject_updates.clone())
        };
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.released.notified().await;
        }
        if let Some(reason) = rejection {
            return Err(ManagerError::Rejected(reason));
        }

        let mut prospective = self.current_state(item_id);
        for (key, value) in extra_data {
            prospective.insert(key.clone(), value.clone());
        }
        Ok(prospective)
    }
}

/// In-memory [`CircleProvider`] keyed by member single id.
#[derive(Debug, Clone, Default)]
pub struct MemoryCircles {
    circles: Arc<Mutex<HashMap<String, HashMap<String, MemberLevel>>>>,
}

impl MemoryCircles {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a circle with no members.
    pub fn add_circle(&self, circle_id: &str) {
        self.circles
            .lock()
            .unwrap()
            .entry(circle_id.to_string())
            .or_default();
    }

    /// Set a user's level in a circle, creating the circle if needed.
    pub fn add_member(&self, circle_id: &str, user: &FederatedUser, level: MemberLevel) {
        self.circles
            .lock()
            .unwrap()
            .entry(circle_id.to_string())
            .or_default()
            .insert(user.single_id.to_string(), level);
    }
}

#[async_trait]
impl CircleProvider for MemoryCircles {
    async fn get_circle(&self, circle_id: &str, actor: &FederatedUser) -> Result<Option<Circle>> {
        let circles = self.circles.lock().unwrap();
        Ok(circles.get(circle_id).map(|members| Circle {
            circle_id: circle_id.to_string(),
            display_name: circle_id.to_string(),
            initiator_level: members
                .get(actor.single_id.as_str())
                .copied()
                .unwrap_or(MemberLevel::None),
        }))
    }
}

/// [`ActorResolver`] that always answers the same user.
#[derive(Debug, Clone, Default)]
pub struct StaticActor {
    actor: Option<FederatedUser>,
}

impl StaticActor {
    /// Resolve to `actor`.
    pub fn new(actor: FederatedUser) -> Self {
        Self { actor: Some(actor) }
    }

    /// Resolve to a fresh local user named `user_id`.
    pub fn local(user_id: &str) -> Self {
        Self::new(FederatedUser::local(SingleId::generate(), user_id))
    }

    /// Resolve to nobody.
    pub fn none() -> Self {
        Self::default()
    }

    /// The user this resolver answers.
    pub fn actor(&self) -> Option<&FederatedUser> {
        self.actor.as_ref()
    }
}

#[async_trait]
impl ActorResolver for StaticActor {
    async fn current_actor(&self) -> Option<FederatedUser> {
        self.actor.clone()
    }
}

/// [`Propagator`] that records every hand-off.
#[derive(Debug, Clone, Default)]
pub struct RecordingPropagator {
    inner: Arc<Mutex<RecordingInner>>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    sent: Vec<Propagation>,
    fail_next: Option<String>,
}

impl RecordingPropagator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything handed off so far.
    pub fn sent(&self) -> Vec<Propagation> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// The last hand-off.
    pub fn last_sent(&self) -> Option<Propagation> {
        self.inner.lock().unwrap().sent.last().cloned()
    }

    /// Make the next hand-off fail.
    pub fn fail_next(&self, reason: &str) {
        self.inner.lock().unwrap().fail_next = Some(reason.to_string());
    }
}

#[async_trait]
impl Propagator for RecordingPropagator {
    async fn propagate(&self, propagation: Propagation) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = inner.fail_next.take() {
            return Err(FederatedSyncError::Propagation(reason));
        }
        inner.sent.push(propagation);
        Ok(())
    }
}
