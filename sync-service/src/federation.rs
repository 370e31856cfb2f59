//! Collaborators consumed by the sync engines.
//!
//! Circle membership, actor resolution and cross-instance transport are
//! owned by the host server; the engines only see these traits.

use crate::error::Result;
use async_trait::async_trait;
use sync_core::FanOut;
use sync_types::{FederatedUser, SyncedWrapper};

/// Membership level of a user in a circle, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberLevel {
    /// Invited or requesting, not yet a member.
    None,
    /// Regular member.
    Member,
    /// Moderator.
    Moderator,
    /// Administrator.
    Admin,
    /// Owner of the circle.
    Owner,
}

/// A circle as seen by the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circle {
    /// Circle identifier.
    pub circle_id: String,
    /// Display name, for logs.
    pub display_name: String,
    /// The acting user's membership level.
    pub initiator_level: MemberLevel,
}

impl Circle {
    /// Whether the acting user is at least a member.
    pub fn initiator_is_member(&self) -> bool {
        self.initiator_level >= MemberLevel::Member
    }
}

/// Resolves circles and the actor's membership in them.
#[async_trait]
pub trait CircleProvider: Send + Sync {
    /// Resolve `circle_id` as seen by `actor`; `None` if it does not exist.
    async fn get_circle(&self, circle_id: &str, actor: &FederatedUser) -> Result<Option<Circle>>;
}

/// Resolves the user on whose behalf the current request runs.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    /// The current actor, if any.
    async fn current_actor(&self) -> Option<FederatedUser>;
}

/// What happened, for a propagated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedEvent {
    /// An item update was accepted by its owner.
    ItemUpdated,
    /// An item was tombstoned.
    ItemDeleted,
    /// A share was created.
    ShareCreated,
    /// A share was modified.
    ShareModified,
    /// A share was deleted.
    ShareDeleted,
}

/// A committed change handed off for delivery to other instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propagation {
    /// What happened.
    pub event: FederatedEvent,
    /// Which instances re-run the callback.
    pub scope: FanOut,
    /// API version the event is produced at.
    pub api_version: u32,
    /// Full context for the receiver.
    pub wrapper: SyncedWrapper,
}

/// Hands committed changes to the federation transport.
///
/// Delivery is at-least-once and unordered; receivers are idempotent.
#[async_trait]
pub trait Propagator: Send + Sync {
    /// Queue a change for delivery.
    async fn propagate(&self, propagation: Propagation) -> Result<()>;
}

/// A propagator that only traces what would be sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPropagator;

#[async_trait]
impl Propagator for LogPropagator {
    async fn propagate(&self, propagation: Propagation) -> Result<()> {
        tracing::debug!(
            event = ?propagation.event,
            scope = ?propagation.scope,
            api_version = propagation.api_version,
            single_id = ?propagation.wrapper.item.as_ref().map(|i| i.single_id.to_string()),
            "Propagation handed off"
        );
        Ok(())
    }
}
