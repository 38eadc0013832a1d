use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mercato_core::{TenantId, UserId};

use crate::{Permission, Role};

/// JWT claims carried by every API token.
///
/// Field names follow the token format issued by the identity service
/// (`companyId` is the tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the acting user.
    pub sub: UserId,

    /// Tenant context for the token.
    #[serde(rename = "companyId")]
    pub company_id: TenantId,

    pub role: Role,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiration, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("invalid token signature")]
    BadSignature,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Clock skew tolerated on `iat`.
const IAT_LEEWAY_SECS: i64 = 60;

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + IAT_LEEWAY_SECS < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
