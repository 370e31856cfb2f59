//! Error types for fedsync wire data.

use thiserror::Error;

/// Errors that can occur while importing or exporting synced entities.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// A single id did not have the expected shape
    #[error("invalid single id: {0:?}")]
    InvalidSingleId(String),

    /// Unknown lock update type
    #[error("invalid lock type: {0}")]
    InvalidLockType(String),

    /// A wrapper lacked a part the receiver needs
    #[error("wrapper is missing its {0}")]
    MissingPart(&'static str),

    /// A wrapper's share names a different item than the wrapper's item
    #[error("share of item {share} does not belong to wrapped item {item}")]
    ShareItemMismatch {
        /// Single id of the wrapped item
        item: String,
        /// Single id the share names
        share: String,
    },
}
