//! API version negotiation between instances.

use thiserror::Error;

/// A message was produced at a version the receiver no longer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message version {message} is below the supported floor {floor}")]
pub struct IncompatibleVersion {
    /// Version the message was produced at.
    pub message: u32,
    /// Lowest version the receiver accepts.
    pub floor: u32,
}

/// The versions a manager speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCompatibility {
    /// Version of messages this side produces.
    pub version: u32,
    /// Lowest message version this side still accepts.
    pub lower_back_compatibility: u32,
}

impl ApiCompatibility {
    /// Create a compatibility descriptor.
    pub fn new(version: u32, lower_back_compatibility: u32) -> Self {
        Self {
            version,
            lower_back_compatibility,
        }
    }

    /// Whether a message produced at `message_version` is accepted.
    pub fn accepts(&self, message_version: u32) -> bool {
        message_version >= self.lower_back_compatibility
    }

    /// Like [`accepts`](Self::accepts), as a `Result`.
    pub fn check(&self, message_version: u32) -> Result<(), IncompatibleVersion> {
        if self.accepts(message_version) {
            Ok(())
        } else {
            Err(IncompatibleVersion {
                message: message_version,
                floor: self.lower_back_compatibility,
            })
        }
    }
}
