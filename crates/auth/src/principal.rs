use serde::Serialize;

use mercato_core::{TenantId, UserId};

use crate::{JwtClaims, Permission, Role};

/// Authenticated caller, as seen by handlers and workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.company_id,
            role: claims.role,
            permissions: claims.permissions,
        }
    }
}
