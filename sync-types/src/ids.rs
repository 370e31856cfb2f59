//! Federation-wide identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WireError;

/// Length of every [`SingleId`], in characters.
pub const SINGLE_ID_LENGTH: usize = 31;

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A globally unique identifier for a circle, member or synced item.
///
/// 31 alphanumeric characters, stable for the life of the entity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SingleId(String);

impl SingleId {
    /// Generate a fresh random SingleId.
    pub fn generate() -> Self {
        let mut id = String::with_capacity(SINGLE_ID_LENGTH);
        let mut buf = [0u8; 64];
        while id.len() < SINGLE_ID_LENGTH {
            getrandom::getrandom(&mut buf).expect("getrandom failed");
            // 248 = 4 * 62, rejecting above it keeps the distribution uniform
            for b in buf.iter().filter(|b| **b < 248) {
                if id.len() == SINGLE_ID_LENGTH {
                    break;
                }
                id.push(ALPHABET[(*b % 62) as usize] as char);
            }
        }
        Self(id)
    }

    /// Parse a SingleId received from storage or another instance.
    pub fn parse(value: &str) -> Result<Self, WireError> {
        if value.len() == SINGLE_ID_LENGTH && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(value.to_string()))
        } else {
            Err(WireError::InvalidSingleId(value.to_string()))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SingleId {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SingleId> for String {
    fn from(id: SingleId) -> Self {
        id.0
    }
}

impl fmt::Display for SingleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SingleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingleId({})", &self.0[..8])
    }
}
