//! The calling application's identity, passed explicitly to every call.

use crate::error::{FederatedSyncError, Result};

/// `(app_id, item_type)` of the host application making a call.
///
/// Can only be built with both parts non-empty, so holding an `Origin` is
/// proof the call is bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    app_id: String,
    item_type: String,
}

impl Origin {
    /// Bind an origin.
    ///
    /// # Errors
    ///
    /// [`FederatedSyncError::OriginNotBound`] if either part is empty.
    pub fn new(app_id: impl Into<String>, item_type: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        let item_type = item_type.into();
        if app_id.trim().is_empty() || item_type.trim().is_empty() {
            return Err(FederatedSyncError::OriginNotBound);
        }
        Ok(Self { app_id, item_type })
    }

    /// Host application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Item type.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app_id, self.item_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_non_empty_origin() {
        let origin = Origin::new("files", "folder").unwrap();
        assert_eq!(origin.app_id(), "files");
        assert_eq!(origin.item_type(), "folder");
        assert_eq!(origin.to_string(), "files/folder");
    }

    #[test]
    fn rejects_empty_parts() {
        for (app, ty) in [("", ""), ("files", ""), ("", "folder"), ("  ", "folder")] {
            assert!(matches!(
                Origin::new(app, ty),
                Err(FederatedSyncError::OriginNotBound)
            ));
        }
    }
}
