//! Legacy HS256 token validation.
//!
//! Verifies tokens minted by `/api/v1/login` and resolves the caller's role.
//! Role resolution order: the `role` claim, then the user store for local
//! users, then `basic_user`. Service-account tokens never consult the store;
//! their name is the full `system:serviceaccount:<ns>:<name>` subject, and
//! only a role claim minted at login can lift them to `admin`.
use crate::store::UserStore;
use async_trait::async_trait;
use dashboard_authz::{
    AuthzError, Identity, IdentitySource, LegacyClaims, LegacyTokenVerifier, Role,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("invalid legacy token: {0}")]
    Invalid(#[from] AuthzError),
    #[error("user lookup failed: {0}")]
    Store(String),
}

#[async_trait]
pub trait LegacyTokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<(Identity, LegacyClaims), LegacyError>;

    /// Identity for claims that were already verified.
    async fn identity_from_claims(&self, claims: &LegacyClaims) -> Result<Identity, LegacyError>;
}

pub struct StoreBackedLegacyValidator {
    verifier: LegacyTokenVerifier,
    users: Arc<dyn UserStore>,
}

impl StoreBackedLegacyValidator {
    pub fn new(verifier: LegacyTokenVerifier, users: Arc<dyn UserStore>) -> Self {
        Self { verifier, users }
    }

    async fn resolve_role(&self, claims: &LegacyClaims, username: &str) -> Result<Role, LegacyError> {
        if let Some(role) = claims.claimed_role() {
            return Ok(role);
        }
        if claims.serviceaccount.is_some() && claims.username.is_empty() {
            return Ok(Role::BasicUser);
        }
        let stored = self
            .users
            .get_user(username)
            .await
            .map_err(|err| LegacyError::Store(err.to_string()))?;
        Ok(stored.map_or(Role::BasicUser, |user| user.role))
    }
}

#[async_trait]
impl LegacyTokenValidator for StoreBackedLegacyValidator {
    async fn validate(&self, token: &str) -> Result<(Identity, LegacyClaims), LegacyError> {
        let claims = self.verifier.verify(token)?;
        let identity = self.identity_from_claims(&claims).await?;
        Ok((identity, claims))
    }

    async fn identity_from_claims(&self, claims: &LegacyClaims) -> Result<Identity, LegacyError> {
        let username = claims
            .effective_username()
            .ok_or(AuthzError::MissingClaim("username"))?;
        let role = self.resolve_role(claims, &username).await?;
        Ok(Identity::new(username, role, IdentitySource::Legacy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRecord;
    use crate::store::memory::InMemoryStore;
    use dashboard_authz::{LegacyTokenIssuer, ServiceAccountClaim};
    use std::time::Duration;

    const SECRET: &[u8] = b"legacy-test-secret";

    fn issuer() -> LegacyTokenIssuer {
        LegacyTokenIssuer::new(SECRET, Duration::from_secs(300)).unwrap()
    }

    async fn validator_with(store: Arc<InMemoryStore>) -> StoreBackedLegacyValidator {
        StoreBackedLegacyValidator::new(LegacyTokenVerifier::new(SECRET, 0).unwrap(), store)
    }

    #[tokio::test]
    async fn claim_role_wins() {
        let validator = validator_with(Arc::new(InMemoryStore::new())).await;
        let token = issuer().mint("admin", Some(Role::Admin), None).unwrap();
        let (identity, claims) = validator.validate(&token).await.unwrap();
        assert_eq!(identity.username, "admin");
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.source, IdentitySource::Legacy);
        assert_eq!(claims.iss, "karmada-dashboard");
    }

    #[tokio::test]
    async fn missing_role_claim_falls_back_to_store() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(UserRecord {
                username: "ops".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        let validator = validator_with(store).await;
        let token = issuer().mint("ops", None, None).unwrap();
        let (identity, _) = validator.validate(&token).await.unwrap();
        assert_eq!(identity.role, Role::Admin);

        let token = issuer().mint("stranger", None, None).unwrap();
        let (identity, _) = validator.validate(&token).await.unwrap();
        assert_eq!(identity.role, Role::BasicUser);
    }

    #[tokio::test]
    async fn service_account_tokens_use_qualified_subject() {
        let validator = validator_with(Arc::new(InMemoryStore::new())).await;
        let sa = ServiceAccountClaim {
            name: "karmada-dashboard".to_string(),
            namespace: Some("karmada-system".to_string()),
        };
        let token = issuer().mint("", None, Some(sa)).unwrap();
        let (identity, claims) = validator.validate(&token).await.unwrap();
        assert_eq!(
            identity.username,
            "system:serviceaccount:karmada-system:karmada-dashboard"
        );
        assert_eq!(identity.role, Role::BasicUser);
        assert!(claims.serviceaccount.is_some());
    }

    #[tokio::test]
    async fn service_account_named_like_local_admin_stays_basic() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(UserRecord {
                username: "admin".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        let validator = validator_with(store).await;
        let sa = ServiceAccountClaim {
            name: "admin".to_string(),
            namespace: Some("sandbox".to_string()),
        };
        let token = issuer().mint("", None, Some(sa)).unwrap();
        let (identity, _) = validator.validate(&token).await.unwrap();
        assert_eq!(identity.username, "system:serviceaccount:sandbox:admin");
        assert_eq!(identity.role, Role::BasicUser);
    }

    #[tokio::test]
    async fn claims_resolve_like_bearer_validation() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(UserRecord {
                username: "ops".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        let validator = validator_with(store).await;
        let token = issuer().mint("ops", None, None).unwrap();
        let (from_bearer, claims) = validator.validate(&token).await.unwrap();
        let from_claims = validator.identity_from_claims(&claims).await.unwrap();
        assert_eq!(from_claims, from_bearer);
        assert_eq!(from_claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let validator = validator_with(Arc::new(InMemoryStore::new())).await;
        let token = LegacyTokenIssuer::new(b"other", Duration::from_secs(60))
            .unwrap()
            .mint("admin", Some(Role::Admin), None)
            .unwrap();
        assert!(matches!(
            validator.validate(&token).await,
            Err(LegacyError::Invalid(_))
        ));
    }
}
