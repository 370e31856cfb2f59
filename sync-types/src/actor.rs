//! The actor behind a federated request.

use serde::{Deserialize, Serialize};

use crate::SingleId;

/// A user known to the federation, possibly living on another instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedUser {
    /// Federation-wide identifier of the member.
    pub single_id: SingleId,
    /// Host-local user id on its home instance.
    pub user_id: String,
    /// Home instance address; empty for this instance.
    #[serde(default)]
    pub instance: String,
}

impl FederatedUser {
    /// Create a user that lives on this instance.
    pub fn local(single_id: SingleId, user_id: impl Into<String>) -> Self {
        Self {
            single_id,
            user_id: user_id.into(),
            instance: String::new(),
        }
    }

    /// Whether the user lives on this instance.
    pub fn is_local(&self) -> bool {
        self.instance.is_empty()
    }
}
