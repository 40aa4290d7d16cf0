//! `storecore-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage; the only
//! transport-adjacent piece is the HS256 token validator.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenDecodeError};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use roles::Role;
