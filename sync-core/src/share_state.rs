//! Share lifecycle state machine - NO I/O, just state transitions.
//!
//! ```text
//! NonExistent --Create(permitted)--> Active --Update(permitted)--> Active
//!      ^                               |
//!      +-----Delete(permitted)---------+
//! ```
//!
//! The authorization gate (`is_share_creatable` and friends) is evaluated by
//! the caller on the owning instance and fed in as `permitted`. A replay of
//! an event that already took effect runs no callback again; it only
//! re-announces the change, so a lost propagation is repaired by retrying
//! the call.
//!
//! Tombstoning the shared item also ends every share of it; storage does
//! that in the same transaction as the tombstone, outside this machine.

/// Whether a `(single_id, circle_id)` share exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareState {
    /// No share row.
    NonExistent,
    /// A share row exists.
    Active,
}

/// Inputs to the share state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareEvent {
    /// Share creation requested.
    Create {
        /// Outcome of the creation gate.
        permitted: bool,
    },
    /// Share modification requested.
    Update {
        /// Outcome of the modification gate.
        permitted: bool,
    },
    /// Share deletion requested.
    Delete {
        /// Outcome of the deletion gate.
        permitted: bool,
    },
}

/// The kind of change a share went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareChange {
    /// The share was created.
    Created,
    /// The share was modified.
    Modified,
    /// The share was deleted.
    Deleted,
}

/// Why a share event was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareRejection {
    /// The creation gate refused.
    NotCreatable,
    /// The modification gate refused.
    NotModifiable,
    /// The deletion gate refused.
    NotDeletable,
    /// The share to modify does not exist.
    NotFound,
}

/// Actions for the share engine to execute, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAction {
    /// Insert the share row.
    PersistShare,
    /// Hard-delete the share row.
    RemoveShare,
    /// Run the manager callback for the change on this instance.
    Notify(ShareChange),
    /// Hand the change off for fan-out to other instances.
    Propagate(ShareChange),
    /// Abort with no side effect.
    Reject(ShareRejection),
}

impl ShareState {
    /// State for a share whose row does or does not exist.
    pub fn from_exists(exists: bool) -> Self {
        if exists {
            Self::Active
        } else {
            Self::NonExistent
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// A rejection never changes state and is always the only action.
    pub fn on_event(self, event: ShareEvent) -> (Self, Vec<ShareAction>) {
        use ShareAction::*;

        match (self, event) {
            (Self::NonExistent, ShareEvent::Update { .. }) => {
                (self, vec![Reject(ShareRejection::NotFound)])
            }

            (_, ShareEvent::Create { permitted: false }) => {
                (self, vec![Reject(ShareRejection::NotCreatable)])
            }
            (_, ShareEvent::Update { permitted: false }) => {
                (self, vec![Reject(ShareRejection::NotModifiable)])
            }
            (_, ShareEvent::Delete { permitted: false }) => {
                (self, vec![Reject(ShareRejection::NotDeletable)])
            }

            (Self::NonExistent, ShareEvent::Create { permitted: true }) => (
                Self::Active,
                vec![
                    PersistShare,
                    Notify(ShareChange::Created),
                    Propagate(ShareChange::Created),
                ],
            ),
            (Self::Active, ShareEvent::Update { permitted: true }) => (
                Self::Active,
                vec![
                    Notify(ShareChange::Modified),
                    Propagate(ShareChange::Modified),
                ],
            ),
            (Self::Active, ShareEvent::Delete { permitted: true }) => (
                Self::NonExistent,
                vec![
                    RemoveShare,
                    Notify(ShareChange::Deleted),
                    Propagate(ShareChange::Deleted),
                ],
            ),

            // Replays of something that already happened
            (Self::Active, ShareEvent::Create { permitted: true }) => {
                (self, vec![Propagate(ShareChange::Created)])
            }
            (Self::NonExistent, ShareEvent::Delete { permitted: true }) => {
                (self, vec![Propagate(ShareChange::Deleted)])
            }
        }
    }

    /// Whether the share exists.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Default for ShareState {
    fn default() -> Self {
        Self::NonExistent
    }
}
