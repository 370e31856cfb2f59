//! # sync-core
//!
//! Pure logic for fedsync (no I/O, instant tests).
//!
//! This crate holds the decisions of the federated share protocol without
//! any storage or network access:
//! - [`checksum`] - deterministic fingerprints of serialized item state
//! - [`lock`] - lock staleness and commit re-validation
//! - [`share_state`] - the share lifecycle state machine
//! - [`version`] - API version compatibility floor
//! - [`fanout`] - which instances re-run a share callback
//!
//! The service crate performs the actual I/O, interpreting the decisions
//! and actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod fanout;
pub mod lock;
pub mod share_state;
pub mod version;

pub use checksum::checksum;
pub use fanout::FanOut;
pub use lock::{LockDecision, LockPolicy, DEFAULT_STALE_AFTER, MIN_STALE_AFTER};
pub use share_state::{ShareAction, ShareChange, ShareEvent, ShareRejection, ShareState};
pub use version::{ApiCompatibility, IncompatibleVersion};
