//! Keycloak access-token validation with cached JWKS.
//!
//! # Purpose
//! Validate RS-signed bearer tokens issued by the configured Keycloak realm and
//! project them onto a dashboard [`Identity`].
//!
//! # Architectural role
//! One of the two validators behind the dual authenticator. It is always tried
//! first when Keycloak is enabled; its failure on an RS-signed token is final.
//!
//! # Key invariants
//! - Only RS256, RS384 and RS512 are accepted.
//! - The issuer must equal `{url}/realms/{realm}`.
//! - When an audience is configured it is enforced; otherwise the `azp`
//!   claim, if present, must name the configured client.
//! - JWKS are cached for a TTL and refreshed once on a `kid` miss to follow
//!   key rotation.
//!
//! # Concurrency model
//! The JWKS cache lives in a `DashMap` shared across request tasks.
//!
//! # Security model
//! - Claims are only trusted after signature verification.
//! - Error details never include token contents.
use crate::config::KeycloakConfig;
use async_trait::async_trait;
use chrono::Utc;
use dashboard_authz::{Identity, KEYCLOAK_ALGORITHMS, KeycloakClaims};
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Validator for Keycloak bearer tokens.
#[async_trait]
pub trait KeycloakTokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Identity, KeycloakError>;
}

/// Errors returned during Keycloak token validation.
///
/// # Security
/// - Error details must not include sensitive token contents.
#[derive(Debug, thiserror::Error)]
pub enum KeycloakError {
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("missing key id")]
    MissingKeyId,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// JWKS-backed Keycloak validator.
///
/// # Examples
/// ```rust
/// use apiserver::auth::keycloak::KeycloakJwksValidator;
/// use apiserver::config::KeycloakConfig;
///
/// let config = KeycloakConfig {
///     enabled: true,
///     url: "https://sso.example.com".to_string(),
///     realm: "karmada".to_string(),
///     client_id: "dashboard".to_string(),
///     admin_roles: vec!["admin".to_string()],
///     audience: None,
/// };
/// let validator = KeycloakJwksValidator::from_config(&config);
/// assert_eq!(validator.issuer(), "https://sso.example.com/realms/karmada");
/// ```
#[derive(Debug, Clone)]
pub struct KeycloakJwksValidator {
    client: reqwest::Client,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    issuer: String,
    jwks_url: String,
    client_id: String,
    audience: Option<String>,
    admin_roles: Vec<String>,
    jwks_ttl: Duration,
    clock_skew_seconds: u64,
}

impl KeycloakJwksValidator {
    pub fn from_config(config: &KeycloakConfig) -> Self {
        Self::new(
            config.issuer(),
            config.jwks_url(),
            config.client_id.clone(),
            config.audience.clone(),
            config.admin_roles.clone(),
        )
    }

    pub fn new(
        issuer: String,
        jwks_url: String,
        client_id: String,
        audience: Option<String>,
        admin_roles: Vec<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_cache: Arc::new(DashMap::new()),
            issuer,
            jwks_url,
            client_id,
            audience,
            admin_roles,
            jwks_ttl: Duration::from_secs(3600),
            clock_skew_seconds: 60,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn get_jwks(&self) -> Result<JwkSet, KeycloakError> {
        // Step 1: Use cached JWKS when it hasn't expired.
        if let Some(entry) = self.jwks_cache.get(&self.jwks_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        // Step 2: Refresh JWKS on cache miss or expiry.
        self.refresh_jwks().await
    }

    async fn refresh_jwks(&self) -> Result<JwkSet, KeycloakError> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.jwks_cache.insert(
            self.jwks_url.clone(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
        Ok(jwks)
    }
}

#[async_trait]
impl KeycloakTokenValidator for KeycloakJwksValidator {
    async fn validate(&self, token: &str) -> Result<Identity, KeycloakError> {
        // Step 1: Check the header algorithm before any network work.
        let header = decode_header(token)?;
        if !KEYCLOAK_ALGORITHMS.contains(&header.alg) {
            return Err(KeycloakError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(KeycloakError::MissingKeyId)?;

        // Step 2: Resolve the signing key, refreshing once on a miss.
        let jwks = self.get_jwks().await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => {
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
            None => {
                let refreshed = self.refresh_jwks().await?;
                let key = find_jwk(&refreshed, kid).ok_or(KeycloakError::JwksKeyNotFound)?;
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
        };

        // Step 3: Enforce issuer, and audience when configured.
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }
        validation.leeway = self.clock_skew_seconds;

        // Step 4: Verify the signature and standard claims.
        let data = decode::<Value>(token, &decoding_key, &validation)?;
        validate_iat(&data.claims, self.clock_skew_seconds)?;
        let claims: KeycloakClaims = serde_json::from_value(data.claims)
            .map_err(|err| KeycloakError::InvalidClaim(format!("claims: {err}")))?;
        if self.audience.is_none()
            && let Some(azp) = claims.azp.as_deref()
            && azp != self.client_id
        {
            return Err(KeycloakError::InvalidClaim("azp".to_string()));
        }

        // Step 5: Project onto an identity with derived role.
        claims
            .into_identity(Some(self.client_id.as_str()), &self.admin_roles)
            .ok_or_else(|| KeycloakError::InvalidClaim("preferred_username".to_string()))
    }
}

fn ensure_jwk_matches_algorithm(
    jwk: &jsonwebtoken::jwk::Jwk,
    alg: Algorithm,
) -> Result<(), KeycloakError> {
    if let Some(key_alg) = jwk.common.key_algorithm {
        let matches = matches!(
            (key_alg, alg),
            (KeyAlgorithm::RS256, Algorithm::RS256)
                | (KeyAlgorithm::RS384, Algorithm::RS384)
                | (KeyAlgorithm::RS512, Algorithm::RS512)
        );
        if !matches {
            return Err(KeycloakError::InvalidJwk("alg mismatch".to_string()));
        }
    }
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Ok(()),
        _ => Err(KeycloakError::InvalidJwk("kty mismatch".to_string())),
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a jsonwebtoken::jwk::Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn validate_iat(claims: &Value, leeway_seconds: u64) -> Result<(), KeycloakError> {
    // `iat` is optional for Keycloak, but when present must not be in the future.
    let Some(iat) = claims.get("iat") else {
        return Ok(());
    };
    let iat = iat
        .as_i64()
        .ok_or_else(|| KeycloakError::InvalidClaim("iat".to_string()))?;
    if iat > Utc::now().timestamp() + leeway_seconds as i64 {
        return Err(KeycloakError::InvalidClaim("iat in future".to_string()));
    }
    Ok(())
}
