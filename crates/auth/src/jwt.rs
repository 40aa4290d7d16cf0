//! HS256 token decoding/signing.
//!
//! Signature verification happens here; the time-window checks stay in
//! [`crate::claims::validate_claims`] so they remain deterministic and
//! testable without a clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{JwtClaims, PrincipalId, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    /// Malformed token, bad signature, or out-of-range timestamps.
    #[error("invalid token")]
    Invalid,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenDecodeError>;
}

/// Registered-claims shape on the wire (RFC 7519 second-precision timestamps).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: Uuid,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HS256 shared-secret validator (and signer, for tests/dev tooling).
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a token carrying the given claims.
    pub fn issue(&self, claims: &JwtClaims) -> Result<String, TokenDecodeError> {
        let wire = WireClaims {
            sub: *claims.sub.as_uuid(),
            roles: claims.roles.iter().map(|r| r.as_str().to_string()).collect(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        };
        encode(&Header::default(), &wire, &self.encoding).map_err(|_| TokenDecodeError::Invalid)
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenDecodeError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks are done via validate_claims below.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<WireClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenDecodeError::Invalid)?;

        let issued_at =
            DateTime::from_timestamp(data.claims.iat, 0).ok_or(TokenDecodeError::Invalid)?;
        let expires_at =
            DateTime::from_timestamp(data.claims.exp, 0).ok_or(TokenDecodeError::Invalid)?;

        let claims = JwtClaims {
            sub: PrincipalId::from_uuid(data.claims.sub),
            roles: data.claims.roles.into_iter().map(Role::new).collect(),
            issued_at,
            expires_at,
        };

        validate_claims(&claims, Utc::now())?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_claims(ttl: Duration) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: PrincipalId::new(),
            roles: vec![Role::new("admin")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + ttl,
        }
    }

    #[test]
    fn issued_tokens_validate_round_trip() {
        let validator = Hs256JwtValidator::new("test-secret");
        let claims = test_claims(Duration::hours(1));

        let token = validator.issue(&claims).unwrap();
        let decoded = validator.validate(&token).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.roles, claims.roles);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = Hs256JwtValidator::new("secret-a");
        let verifier = Hs256JwtValidator::new("secret-b");

        let token = signer.issue(&test_claims(Duration::hours(1))).unwrap();
        assert_eq!(verifier.validate(&token), Err(TokenDecodeError::Invalid));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let validator = Hs256JwtValidator::new("test-secret");
        let token = validator.issue(&test_claims(Duration::seconds(-30))).unwrap();

        assert_eq!(
            validator.validate(&token),
            Err(TokenDecodeError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let validator = Hs256JwtValidator::new("test-secret");
        assert_eq!(
            validator.validate("not.a.token"),
            Err(TokenDecodeError::Invalid)
        );
    }
}
