//! Fan-out scope of share callbacks.
//!
//! After the owning instance commits a share mutation it runs the matching
//! manager callback once, locally. Whether the propagated event also
//! re-runs the callback on the owner depends on the manager's
//! `is_full_support()`.

/// Which instances a propagated share event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Every instance hosting a member of the circle, the owner included.
    AllInstances,
    /// Every instance hosting a member of the circle except the owner.
    RemoteOnly,
}

impl FanOut {
    /// Scope for a manager with the given full-support flag.
    pub fn for_manager(full_support: bool) -> Self {
        if full_support {
            FanOut::AllInstances
        } else {
            FanOut::RemoteOnly
        }
    }

    /// Whether the owning instance receives the event a second time.
    pub fn reinvokes_on_owner(&self) -> bool {
        matches!(self, FanOut::AllInstances)
    }

    /// Whether an instance receiving the event should run the callback.
    ///
    /// `item_is_local` is true on the owning instance.
    pub fn applies_to(&self, item_is_local: bool) -> bool {
        !item_is_local || self.reinvokes_on_owner()
    }
}
