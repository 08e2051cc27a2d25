//! Dual-scheme bearer authentication.
//!
//! # Purpose
//! Resolves a bearer token to an [`Identity`] using either the Keycloak
//! validator or the legacy HS256 validator.
//!
//! # Scheme arbitration
//! 1. A missing or blank token fails with [`AuthError::MissingToken`].
//! 2. When Keycloak is configured it is always tried first.
//! 3. If Keycloak fails and the header algorithm is RS256/RS384/RS512, the
//!    request fails right there. Legacy validation is never attempted for an
//!    RS-signed token, so a token cannot be accepted under the wrong trust root.
//! 4. Otherwise an HS256 token is handed to the legacy validator exactly once.
//!
//! The outcome is an [`AuthResult`] whose variant records which trust root
//! accepted the token. Failures are never retried.
use crate::auth::keycloak::KeycloakTokenValidator;
use crate::auth::legacy::{LegacyError, LegacyTokenValidator};
use axum::http::HeaderMap;
use dashboard_authz::{Identity, LegacyClaims, TokenScheme};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("authentication backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub enum AuthResult {
    Legacy {
        identity: Identity,
        claims: LegacyClaims,
    },
    Keycloak(Identity),
    Failed(AuthError),
}

impl AuthResult {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthResult::Legacy { identity, .. } => Some(identity),
            AuthResult::Keycloak(identity) => Some(identity),
            AuthResult::Failed(_) => None,
        }
    }

    pub fn into_parts(self) -> Result<(Identity, Option<LegacyClaims>), AuthError> {
        match self {
            AuthResult::Legacy { identity, claims } => Ok((identity, Some(claims))),
            AuthResult::Keycloak(identity) => Ok((identity, None)),
            AuthResult::Failed(err) => Err(err),
        }
    }

    fn scheme_label(&self) -> &'static str {
        match self {
            AuthResult::Legacy { .. } => "legacy",
            AuthResult::Keycloak(_) => "keycloak",
            AuthResult::Failed(_) => "none",
        }
    }
}

#[derive(Clone)]
pub struct DualAuthenticator {
    keycloak: Option<Arc<dyn KeycloakTokenValidator>>,
    legacy: Arc<dyn LegacyTokenValidator>,
}

impl DualAuthenticator {
    pub fn new(
        keycloak: Option<Arc<dyn KeycloakTokenValidator>>,
        legacy: Arc<dyn LegacyTokenValidator>,
    ) -> Self {
        Self { keycloak, legacy }
    }

    pub fn keycloak(&self) -> Option<&Arc<dyn KeycloakTokenValidator>> {
        self.keycloak.as_ref()
    }

    /// Identity for verified legacy claims, resolved with the same role rules
    /// as [`DualAuthenticator::authenticate`].
    pub async fn legacy_identity(&self, claims: &LegacyClaims) -> Result<Identity, AuthError> {
        self.legacy
            .identity_from_claims(claims)
            .await
            .map_err(|err| match err {
                LegacyError::Invalid(_) => AuthError::InvalidToken,
                LegacyError::Store(reason) => AuthError::Backend(reason),
            })
    }

    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult {
        let result = self.resolve(token).await;
        let outcome = match &result {
            AuthResult::Failed(AuthError::MissingToken) => "missing",
            AuthResult::Failed(AuthError::InvalidToken) => "invalid",
            AuthResult::Failed(AuthError::Backend(_)) => "error",
            _ => "ok",
        };
        metrics::counter!(
            "dashboard_auth_attempts_total",
            "scheme" => result.scheme_label(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn resolve(&self, token: Option<&str>) -> AuthResult {
        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            return AuthResult::Failed(AuthError::MissingToken);
        };
        // Header sniffing only; signatures are checked by the validators.
        let scheme = TokenScheme::detect(token).ok();

        if let Some(keycloak) = &self.keycloak {
            match keycloak.validate(token).await {
                Ok(identity) => return AuthResult::Keycloak(identity),
                Err(err) if scheme.as_ref().is_some_and(TokenScheme::is_keycloak) => {
                    tracing::debug!(error = %err, "keycloak rejected rs-signed token");
                    return AuthResult::Failed(AuthError::InvalidToken);
                }
                Err(err) => {
                    tracing::trace!(error = %err, "keycloak declined token, trying legacy");
                }
            }
        }

        match scheme {
            Some(TokenScheme::Legacy) => match self.legacy.validate(token).await {
                Ok((identity, claims)) => AuthResult::Legacy { identity, claims },
                Err(LegacyError::Invalid(err)) => {
                    tracing::debug!(error = %err, "legacy token rejected");
                    AuthResult::Failed(AuthError::InvalidToken)
                }
                Err(LegacyError::Store(reason)) => {
                    tracing::warn!(%reason, "legacy role lookup failed");
                    AuthResult::Failed(AuthError::Backend(reason))
                }
            },
            _ => AuthResult::Failed(AuthError::InvalidToken),
        }
    }
}

/// Bearer token from the `Authorization` header, if present.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::keycloak::KeycloakError;
    use async_trait::async_trait;
    use dashboard_authz::{
        AuthzError, IdentitySource, LegacyTokenIssuer, Role, now_epoch_seconds,
    };
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) struct SpyKeycloak {
        pub accept: bool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl KeycloakTokenValidator for SpyKeycloak {
        async fn validate(&self, _token: &str) -> Result<Identity, KeycloakError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept {
                Ok(Identity::new("kc-user", Role::Admin, IdentitySource::Keycloak))
            } else {
                Err(KeycloakError::InvalidClaim("rejected".to_string()))
            }
        }
    }

    pub(crate) struct SpyLegacy {
        pub result: Result<Role, ()>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl LegacyTokenValidator for SpyLegacy {
        async fn validate(&self, _token: &str) -> Result<(Identity, LegacyClaims), LegacyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Ok(role) => {
                    let now = now_epoch_seconds();
                    let claims = LegacyClaims {
                        iss: "karmada-dashboard".to_string(),
                        username: "admin".to_string(),
                        role: Some(role.as_str().to_string()),
                        serviceaccount: None,
                        iat: now,
                        exp: now + 60,
                    };
                    Ok((Identity::new("admin", role, IdentitySource::Legacy), claims))
                }
                Err(()) => Err(LegacyError::Invalid(AuthzError::InvalidClaim(
                    "signature".to_string(),
                ))),
            }
        }

        async fn identity_from_claims(
            &self,
            claims: &LegacyClaims,
        ) -> Result<Identity, LegacyError> {
            let role = self.result.unwrap_or(Role::BasicUser);
            Ok(Identity::new(claims.username.clone(), role, IdentitySource::Legacy))
        }
    }

    fn spies(
        keycloak: Option<bool>,
        legacy_ok: bool,
    ) -> (DualAuthenticator, Option<Arc<SpyKeycloak>>, Arc<SpyLegacy>) {
        let keycloak = keycloak.map(|accept| {
            Arc::new(SpyKeycloak {
                accept,
                calls: AtomicUsize::new(0),
            })
        });
        let legacy = Arc::new(SpyLegacy {
            result: if legacy_ok { Ok(Role::Admin) } else { Err(()) },
            calls: AtomicUsize::new(0),
        });
        let auth = DualAuthenticator::new(
            keycloak
                .clone()
                .map(|kc| kc as Arc<dyn KeycloakTokenValidator>),
            legacy.clone(),
        );
        (auth, keycloak, legacy)
    }

    fn hs256_token() -> String {
        LegacyTokenIssuer::new(b"secret", Duration::from_secs(60))
            .unwrap()
            .mint("admin", Some(Role::Admin), None)
            .unwrap()
    }

    /// Structurally valid RS* token; only the header matters to arbitration.
    fn rs_token(alg: Algorithm) -> String {
        let mut header = Header::new(alg);
        header.kid = Some("kid-1".to_string());
        jsonwebtoken::encode(
            &header,
            &serde_json::json!({ "sub": "x", "exp": now_epoch_seconds() + 60 }),
            &EncodingKey::from_rsa_pem(
                crate::auth::keycloak::tests::TEST_PRIVATE_KEY_PEM.as_bytes(),
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn rs_tokens_rejected_by_keycloak_never_reach_legacy() {
        for alg in [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512] {
            let (auth, keycloak, legacy) = spies(Some(false), true);
            let result = auth.authenticate(Some(&rs_token(alg))).await;
            assert!(matches!(result, AuthResult::Failed(AuthError::InvalidToken)));
            assert_eq!(keycloak.unwrap().calls.load(Ordering::SeqCst), 1);
            assert_eq!(legacy.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn rs_tokens_without_keycloak_are_invalid() {
        let (auth, _, legacy) = spies(None, true);
        let result = auth.authenticate(Some(&rs_token(Algorithm::RS256))).await;
        assert!(matches!(result, AuthResult::Failed(AuthError::InvalidToken)));
        assert_eq!(legacy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hs256_falls_back_to_legacy_exactly_once() {
        let (auth, keycloak, legacy) = spies(Some(false), true);
        let result = auth.authenticate(Some(&hs256_token())).await;
        assert!(matches!(result, AuthResult::Legacy { .. }));
        assert_eq!(keycloak.unwrap().calls.load(Ordering::SeqCst), 1);
        assert_eq!(legacy.calls.load(Ordering::SeqCst), 1);

        let (auth, _, legacy) = spies(None, false);
        let result = auth.authenticate(Some(&hs256_token())).await;
        assert!(matches!(result, AuthResult::Failed(AuthError::InvalidToken)));
        assert_eq!(legacy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keycloak_success_short_circuits() {
        let (auth, _, legacy) = spies(Some(true), true);
        let result = auth.authenticate(Some(&rs_token(Algorithm::RS256))).await;
        let identity = result.identity().cloned().unwrap();
        assert_eq!(identity.source, IdentitySource::Keycloak);
        assert_eq!(legacy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_and_garbage_tokens() {
        let (auth, _, legacy) = spies(None, true);
        assert!(matches!(
            auth.authenticate(None).await,
            AuthResult::Failed(AuthError::MissingToken)
        ));
        assert!(matches!(
            auth.authenticate(Some("  ")).await,
            AuthResult::Failed(AuthError::MissingToken)
        ));
        assert!(matches!(
            auth.authenticate(Some("not-a-jwt")).await,
            AuthResult::Failed(AuthError::InvalidToken)
        ));
        assert_eq!(legacy.calls.load(Ordering::SeqCst), 0);
        assert_eq!(AuthError::MissingToken.to_string(), "missing token");
        assert_eq!(AuthError::InvalidToken.to_string(), "invalid token");
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc".parse().unwrap(),
        );
        assert_eq!(extract_bearer(&headers), Some("abc"));
        headers.insert(axum::http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);
    }
}
