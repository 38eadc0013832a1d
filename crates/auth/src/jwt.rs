//! Bearer token decoding.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Turns a raw bearer token into verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 shared-secret validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenValidationError::BadSignature,
                _ => TokenValidationError::Malformed(e.to_string()),
            }
        })?;
        validate_claims(&data.claims, Utc::now())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Permission, Role};
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use mercato_core::{TenantId, UserId};

    fn mint(secret: &[u8], exp_in: Duration) -> String {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            company_id: TenantId::new(),
            role: Role::new("clerk"),
            permissions: vec![Permission::new("sales.orders.read")],
            iat: now.timestamp(),
            exp: (now + exp_in).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let v = Hs256JwtValidator::new(b"s3cret");
        let claims = v.validate(&mint(b"s3cret", Duration::hours(1))).unwrap();
        assert_eq!(claims.permissions[0].as_str(), "sales.orders.read");
    }

    #[test]
    fn rejects_other_secret_and_expired_tokens() {
        let v = Hs256JwtValidator::new(b"s3cret");
        assert_eq!(
            v.validate(&mint(b"other", Duration::hours(1))).unwrap_err(),
            TokenValidationError::BadSignature
        );
        assert_eq!(
            v.validate(&mint(b"s3cret", Duration::hours(-1))).unwrap_err(),
            TokenValidationError::Expired
        );
        assert!(matches!(
            v.validate("not-a-jwt").unwrap_err(),
            TokenValidationError::Malformed(_)
        ));
    }
}
