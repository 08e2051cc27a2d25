//! Token scheme detection from the JWT header.
//!
//! The header `alg` alone decides which trust root is authoritative for a
//! token. RS-signed tokens belong to the OIDC provider and must never be
//! handed to the HMAC verifier.
use crate::{AuthzError, AuthzResult};
use jsonwebtoken::{Algorithm, decode_header};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    /// HS256 tokens minted by the dashboard itself.
    Legacy,
    /// RS256/RS384/RS512 tokens issued by Keycloak.
    Keycloak,
    /// Any other algorithm; neither validator accepts these.
    Unsupported(Algorithm),
}

impl TokenScheme {
    pub fn from_algorithm(alg: Algorithm) -> Self {
        match alg {
            Algorithm::HS256 => TokenScheme::Legacy,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => TokenScheme::Keycloak,
            other => TokenScheme::Unsupported(other),
        }
    }

    /// Inspect the unverified header of `token`.
    pub fn detect(token: &str) -> AuthzResult<Self> {
        let header =
            decode_header(token).map_err(|err| AuthzError::MalformedToken(err.to_string()))?;
        Ok(Self::from_algorithm(header.alg))
    }

    pub fn is_keycloak(&self) -> bool {
        matches!(self, TokenScheme::Keycloak)
    }
}

pub const KEYCLOAK_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
