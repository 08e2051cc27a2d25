//! Identity and token primitives shared by the Karmada dashboard services.
//!
//! # Purpose
//! Centralizes the identity model, legacy HS256 token handling, token-scheme
//! detection, and Keycloak role derivation so the HTTP layer stays thin.
//!
//! # How it fits
//! The API server validates bearer tokens with the helpers here, then feeds
//! the resulting [`Identity`] into its authorization gate and cluster router.
//!
//! # Key invariants
//! - A token's header algorithm alone decides its trust root: HS256 is legacy,
//!   RS256/RS384/RS512 is Keycloak.
//! - Legacy verification pins HS256; it never accepts asymmetric tokens.
//!
//! # Examples
//! ```rust
//! use dashboard_authz::{LegacyTokenIssuer, Role, TokenScheme};
//! use std::time::Duration;
//!
//! let issuer = LegacyTokenIssuer::new(b"secret", Duration::from_secs(60)).unwrap();
//! let token = issuer.mint("admin", Some(Role::Admin), None).unwrap();
//! assert_eq!(TokenScheme::detect(&token).unwrap(), TokenScheme::Legacy);
//! ```

mod errors;
mod identity;
mod keycloak;
mod scheme;
mod token;

pub use errors::{AuthzError, AuthzResult};
pub use identity::{Identity, IdentitySource, Role, cluster_object};
pub use keycloak::{DEFAULT_ADMIN_ROLES, KeycloakClaims, RoleSet, default_admin_roles, derive_role};
pub use scheme::{KEYCLOAK_ALGORITHMS, TokenScheme};
pub use token::{
    LEGACY_ISSUER, LegacyClaims, LegacyTokenIssuer, LegacyTokenVerifier, SERVICE_ACCOUNT_PREFIX,
    ServiceAccountClaim, now_epoch_seconds,
};
