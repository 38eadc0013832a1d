use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - `admin` role, the `*` wildcard or the exact permission grants access
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.role.is_admin() {
        return Ok(());
    }
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);
    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
