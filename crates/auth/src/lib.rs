//! `mercato-auth`: authentication/authorization boundary.
//!
//! Bearer-token validation and permission checks. Decoupled from HTTP and
//! storage; the API layer feeds it raw tokens and required permissions.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
