//! Lock staleness and commit re-validation.
//!
//! A [`SyncedItemLock`] is the only mutual-exclusion primitive of the
//! protocol. Its liveness is time-bounded: once older than the staleness
//! window it is treated as abandoned, so a crashed holder cannot deadlock
//! an item forever.

use std::time::Duration;
use sync_types::SyncedItemLock;

/// Default staleness window (10 minutes).
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

/// Shortest staleness window. Lock times have one-second resolution, so a
/// shorter window would let a takeover carry the same time as the lock it
/// replaced.
pub const MIN_STALE_AFTER: Duration = Duration::from_secs(1);

/// Outcome of an acquire attempt against the currently stored lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    /// No lock exists.
    Acquire,
    /// A lock exists but is stale and may be replaced.
    TakeOverStale {
        /// Age of the abandoned lock in seconds.
        age_secs: u64,
    },
    /// A live lock exists.
    Conflict {
        /// Age of the live lock in seconds.
        age_secs: u64,
    },
}

/// Staleness rules for locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    stale_after: Duration,
}

impl LockPolicy {
    /// Create a policy with the given staleness window, raised to
    /// [`MIN_STALE_AFTER`] if shorter.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after: stale_after.max(MIN_STALE_AFTER),
        }
    }

    /// The staleness window.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Whether `lock` is abandoned at `now` (unix seconds).
    pub fn is_stale(&self, lock: &SyncedItemLock, now: i64) -> bool {
        lock.age_secs(now) >= self.stale_after.as_secs()
    }

    /// Locks taken at or before this timestamp are stale at `now`.
    pub fn stale_cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.stale_after.as_secs() as i64)
    }

    /// Decide an acquire attempt given the stored lock, if any.
    pub fn decide(&self, existing: Option<&SyncedItemLock>, now: i64) -> LockDecision {
        match existing {
            None => LockDecision::Acquire,
            Some(lock) if self.is_stale(lock, now) => LockDecision::TakeOverStale {
                age_secs: lock.age_secs(now),
            },
            Some(lock) => LockDecision::Conflict {
                age_secs: lock.age_secs(now),
            },
        }
    }

    /// Whether the holder of `held` may commit state with `checksum`.
    ///
    /// `stored` is the lock as currently persisted. The commit is refused if
    /// the lock was lost (removed or taken over) or, when the lock requires
    /// checksum verification, if the committed state is not the one the lock
    /// was taken for.
    pub fn may_commit(
        &self,
        held: &SyncedItemLock,
        stored: Option<&SyncedItemLock>,
        checksum: &str,
    ) -> bool {
        let Some(stored) = stored else {
            return false;
        };
        if stored.time != held.time || stored.update_type_id != held.update_type_id {
            return false;
        }
        if !stored.verify_checksum {
            return true;
        }
        stored.checksum.as_deref() == Some(checksum)
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::LockType;

    fn lock_at(time: i64) -> SyncedItemLock {
        SyncedItemLock::new(LockType::Item, "item-1", time)
    }

    #[test]
    fn no_lock_is_acquired() {
        let policy = LockPolicy::default();
        assert_eq!(policy.decide(None, 1_000), LockDecision::Acquire);
    }

    #[test]
    fn live_lock_conflicts() {
        let policy = LockPolicy::new(Duration::from_secs(60));
        let lock = lock_at(1_000);
        let decision = policy.decide(Some(&lock), 1_030);
        assert_eq!(decision, LockDecision::Conflict { age_secs: 30 });
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let policy = LockPolicy::new(Duration::from_secs(60));
        let lock = lock_at(1_000);
        let decision = policy.decide(Some(&lock), 1_060);
        assert_eq!(decision, LockDecision::TakeOverStale { age_secs: 60 });
    }

    #[test]
    fn zero_window_is_raised_to_minimum() {
        let policy = LockPolicy::new(Duration::ZERO);
        assert_eq!(policy.stale_after(), MIN_STALE_AFTER);
        // a lock taken this second is still live
        assert_eq!(
            policy.decide(Some(&lock_at(1_000)), 1_000),
            LockDecision::Conflict { age_secs: 0 }
        );
    }

    #[test]
    fn cutoff_matches_is_stale() {
        let policy = LockPolicy::new(Duration::from_secs(60));
        let now = 5_000;
        let cutoff = policy.stale_cutoff(now);
        assert!(policy.is_stale(&lock_at(cutoff), now));
        assert!(!policy.is_stale(&lock_at(cutoff + 1), now));
    }

    #[test]
    fn future_lock_is_live() {
        // Clock skew: a lock from the future is never considered stale.
        let policy = LockPolicy::new(Duration::from_secs(60));
        assert!(!policy.is_stale(&lock_at(2_000), 1_000));
    }

    #[test]
    fn commit_requires_lock_still_held() {
        let policy = LockPolicy::default();
        let held = lock_at(1_000);
        assert!(!policy.may_commit(&held, None, "sum"));

        let taken_over = lock_at(1_700);
        assert!(!policy.may_commit(&held, Some(&taken_over), "sum"));

        assert!(policy.may_commit(&held, Some(&held), "sum"));
    }

    #[test]
    fn commit_verifies_checksum_when_required() {
        let policy = LockPolicy::default();
        let held = lock_at(1_000);
        let mut stored = held.clone();
        stored.verify_checksum = true;
        stored.checksum = Some("expected".into());

        assert!(policy.may_commit(&held, Some(&stored), "expected"));
        assert!(!policy.may_commit(&held, Some(&stored), "other"));
    }
}
