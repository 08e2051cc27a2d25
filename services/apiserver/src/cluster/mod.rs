//! Member-cluster client routing.
//!
//! # Purpose
//! Builds Kubernetes clients scoped either to the Karmada control plane or to
//! one member cluster reached through Karmada's cluster-proxy subresource.
//!
//! # Routing
//! A member cluster `name` is reached by rewriting the control-plane host to
//! `{karmadaHost}/apis/cluster.karmada.io/v1alpha1/clusters/{name}/proxy/`.
//! One credential set therefore reaches every onboarded member cluster.
//! Configurations are rebuilt on every call and never cached.
//!
//! # Authorization
//! Before a member-cluster client is built the caller is resolved (attached
//! identity, then attached legacy claims, then the raw bearer token) and the
//! authorization gate is consulted. A denial is an explicit
//! [`RouterError::Forbidden`] naming user and cluster.
pub mod kinds;
pub mod loader;
pub mod probe;

use crate::auth::authenticator::{AuthError, DualAuthenticator, extract_bearer};
use crate::auth::gate::{AuthorizationGate, GateError};
use crate::cluster::loader::ClusterConfigs;
use axum::http::{HeaderMap, Uri};
use dashboard_authz::{Identity, LegacyClaims};

/// Path segment of the Karmada cluster aggregated API.
pub const CLUSTER_PROXY_PREFIX: &str = "apis/cluster.karmada.io/v1alpha1/clusters";

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("user {user} is not allowed to access cluster {cluster}")]
    Forbidden { user: String, cluster: String },
    #[error(transparent)]
    Authorization(#[from] GateError),
    #[error(transparent)]
    Unauthenticated(#[from] AuthError),
    #[error("invalid member cluster config: {0}")]
    Config(String),
    #[error("build kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Whatever the request pipeline has learned about the caller so far.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub identity: Option<Identity>,
    pub legacy_claims: Option<LegacyClaims>,
    pub bearer: Option<String>,
}

impl CallerContext {
    pub fn new(
        identity: Option<Identity>,
        legacy_claims: Option<LegacyClaims>,
        headers: &HeaderMap,
    ) -> Self {
        Self {
            identity,
            legacy_claims,
            bearer: extract_bearer(headers).map(str::to_string),
        }
    }
}

#[derive(Clone)]
pub struct ClusterRouter {
    configs: ClusterConfigs,
    gate: AuthorizationGate,
    authenticator: DualAuthenticator,
}

impl ClusterRouter {
    pub fn new(
        configs: ClusterConfigs,
        gate: AuthorizationGate,
        authenticator: DualAuthenticator,
    ) -> Self {
        Self {
            configs,
            gate,
            authenticator,
        }
    }

    pub fn karmada_host(&self) -> &str {
        &self.configs.karmada_host
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Resolve the caller from the richest source available.
    pub async fn resolve_identity(&self, caller: &CallerContext) -> Option<Identity> {
        if let Some(identity) = &caller.identity {
            return Some(identity.clone());
        }
        if let Some(claims) = &caller.legacy_claims {
            match self.authenticator.legacy_identity(claims).await {
                Ok(identity) => return Some(identity),
                Err(err) => tracing::debug!(error = %err, "legacy claims did not resolve"),
            }
        }
        let bearer = caller.bearer.as_deref()?;
        self.authenticator
            .authenticate(Some(bearer))
            .await
            .identity()
            .cloned()
    }

    /// Check that the caller may reach `cluster`. Empty names are management scope.
    pub async fn authorize(&self, caller: &CallerContext, cluster: &str) -> Result<(), RouterError> {
        if cluster.is_empty() {
            return Ok(());
        }
        match self.resolve_identity(caller).await {
            Some(identity) => {
                if self.gate.authorize(&identity, cluster).await? {
                    Ok(())
                } else {
                    Err(RouterError::Forbidden {
                        user: identity.username,
                        cluster: cluster.to_string(),
                    })
                }
            }
            None if self.gate.engine_configured() => Err(RouterError::Forbidden {
                user: "anonymous".to_string(),
                cluster: cluster.to_string(),
            }),
            None => {
                tracing::warn!(cluster, "no caller identity and no authorization engine, allowing");
                Ok(())
            }
        }
    }

    /// Authorized configuration for `cluster`, or the control plane when empty.
    pub async fn config_for(
        &self,
        caller: &CallerContext,
        cluster: &str,
    ) -> Result<kube::Config, RouterError> {
        self.authorize(caller, cluster).await?;
        if cluster.is_empty() {
            return Ok(self.configs.karmada.clone());
        }
        member_config(&self.configs.karmada, &self.configs.karmada_host, cluster)
    }

    pub async fn client_for(
        &self,
        caller: &CallerContext,
        cluster: &str,
    ) -> Result<kube::Client, RouterError> {
        let config = self.config_for(caller, cluster).await?;
        Ok(kube::Client::try_from(config)?)
    }

    /// Like [`Self::config_for`], but an empty cluster means the management
    /// cluster, where pods and nodes actually run.
    pub async fn workload_config_for(
        &self,
        caller: &CallerContext,
        cluster: &str,
    ) -> Result<kube::Config, RouterError> {
        if cluster.is_empty() {
            return Ok(self.configs.management.clone());
        }
        self.config_for(caller, cluster).await
    }

    pub async fn workload_client_for(
        &self,
        caller: &CallerContext,
        cluster: &str,
    ) -> Result<kube::Client, RouterError> {
        let config = self.workload_config_for(caller, cluster).await?;
        Ok(kube::Client::try_from(config)?)
    }

    /// Unscoped control-plane client for dashboard-internal calls.
    pub fn karmada_client(&self) -> Result<kube::Client, RouterError> {
        Ok(kube::Client::try_from(self.configs.karmada.clone())?)
    }
}

/// Proxy URL through which Karmada forwards requests to `cluster`.
pub fn member_proxy_url(karmada_host: &str, cluster: &str) -> String {
    format!(
        "{}/{CLUSTER_PROXY_PREFIX}/{cluster}/proxy/",
        karmada_host.trim_end_matches('/')
    )
}

/// Clone `base` with its host rewritten onto the member-cluster proxy.
pub fn member_config(
    base: &kube::Config,
    karmada_host: &str,
    cluster: &str,
) -> Result<kube::Config, RouterError> {
    if !is_valid_cluster_name(cluster) {
        return Err(RouterError::Config(format!("invalid cluster name {cluster:?}")));
    }
    let url = member_proxy_url(karmada_host, cluster);
    let uri = url
        .parse::<Uri>()
        .map_err(|err| RouterError::Config(format!("{url}: {err}")))?;
    let mut config = base.clone();
    config.cluster_url = uri;
    Ok(config)
}

// Cluster names are Kubernetes object names; anything else could escape the proxy path.
fn is_valid_cluster_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !name.starts_with(['-', '.'])
        && !name.contains("..")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::legacy::StoreBackedLegacyValidator;
    use crate::auth::openfga::{CheckError, RelationshipChecker};
    use crate::store::UserStore;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use dashboard_authz::{IdentitySource, LegacyTokenIssuer, LegacyTokenVerifier, Role};
    use std::sync::Arc;
    use std::time::Duration;

    const HOST: &str = "https://karmada-apiserver:5443";
    const SECRET: &[u8] = b"router-secret";

    struct AllowOnly(&'static str);

    #[async_trait]
    impl RelationshipChecker for AllowOnly {
        async fn check(&self, user: &str, _relation: &str, _object: &str) -> Result<bool, CheckError> {
            Ok(user == format!("user:{}", self.0))
        }
    }

    pub(crate) fn test_configs() -> ClusterConfigs {
        ClusterConfigs {
            karmada: kube::Config::new(HOST.parse().unwrap()),
            management: kube::Config::new("https://host.example:6443".parse().unwrap()),
            karmada_host: HOST.to_string(),
        }
    }

    fn test_router(checker: Option<Arc<dyn RelationshipChecker>>) -> ClusterRouter {
        test_router_with(Arc::new(InMemoryStore::new()), checker)
    }

    fn test_router_with(
        store: Arc<InMemoryStore>,
        checker: Option<Arc<dyn RelationshipChecker>>,
    ) -> ClusterRouter {
        let legacy = StoreBackedLegacyValidator::new(
            LegacyTokenVerifier::new(SECRET, 0).unwrap(),
            store.clone(),
        );
        ClusterRouter::new(
            test_configs(),
            AuthorizationGate::new(checker, store, "can_access", true),
            DualAuthenticator::new(None, Arc::new(legacy)),
        )
    }

    #[test]
    fn member_host_is_rewritten_exactly() {
        let base = kube::Config::new(HOST.parse().unwrap());
        let config = member_config(&base, HOST, "east-1").unwrap();
        assert_eq!(
            config.cluster_url.to_string(),
            "https://karmada-apiserver:5443/apis/cluster.karmada.io/v1alpha1/clusters/east-1/proxy/"
        );
        let trailing = member_config(&base, "https://karmada-apiserver:5443/", "east-1").unwrap();
        assert_eq!(trailing.cluster_url, config.cluster_url);
    }

    #[test]
    fn cluster_names_cannot_escape_the_proxy_path() {
        let base = kube::Config::new(HOST.parse().unwrap());
        for bad in ["", "../etc", "a/b", "East", "-x"] {
            assert!(member_config(&base, HOST, bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn empty_cluster_uses_unmodified_configs() {
        let router = test_router(None);
        let caller = CallerContext::default();
        let config = router.config_for(&caller, "").await.unwrap();
        assert_eq!(config.cluster_url.to_string(), "https://karmada-apiserver:5443/");
        let workload = router.workload_config_for(&caller, "").await.unwrap();
        assert_eq!(workload.cluster_url.to_string(), "https://host.example:6443/");
    }

    #[tokio::test]
    async fn denial_names_user_and_cluster() {
        let router = test_router(Some(Arc::new(AllowOnly("alice"))));
        let bob = CallerContext {
            identity: Some(Identity::new("bob", Role::BasicUser, IdentitySource::Legacy)),
            ..CallerContext::default()
        };
        let err = router.config_for(&bob, "east-1").await.unwrap_err();
        assert_eq!(err.to_string(), "user bob is not allowed to access cluster east-1");

        let alice = CallerContext {
            identity: Some(Identity::new("alice", Role::BasicUser, IdentitySource::Legacy)),
            ..CallerContext::default()
        };
        let config = router.config_for(&alice, "east-1").await.unwrap();
        assert!(config.cluster_url.to_string().ends_with("/clusters/east-1/proxy/"));
    }

    #[tokio::test]
    async fn identity_falls_back_to_claims_then_bearer() {
        let router = test_router(Some(Arc::new(AllowOnly("alice"))));
        let issuer = LegacyTokenIssuer::new(SECRET, Duration::from_secs(60)).unwrap();
        let token = issuer.mint("alice", Some(Role::BasicUser), None).unwrap();
        let claims = LegacyTokenVerifier::new(SECRET, 0).unwrap().verify(&token).unwrap();

        let from_claims = CallerContext {
            legacy_claims: Some(claims),
            ..CallerContext::default()
        };
        assert_eq!(
            router.resolve_identity(&from_claims).await.unwrap().username,
            "alice"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        let from_header = CallerContext::new(None, None, &headers);
        assert!(router.config_for(&from_header, "east-1").await.is_ok());
    }

    #[tokio::test]
    async fn claims_without_role_use_stored_role() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(crate::model::UserRecord {
                username: "ops".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                created_at: "2024-01-01T00:00:00Z".to_string(),
            })
            .await
            .unwrap();
        let router = test_router_with(store, None);
        let issuer = LegacyTokenIssuer::new(SECRET, Duration::from_secs(60)).unwrap();
        let token = issuer.mint("ops", None, None).unwrap();
        let claims = LegacyTokenVerifier::new(SECRET, 0).unwrap().verify(&token).unwrap();

        let from_claims = CallerContext {
            legacy_claims: Some(claims),
            ..CallerContext::default()
        };
        let identity = router.resolve_identity(&from_claims).await.unwrap();
        assert_eq!(identity.username, "ops");
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn unresolved_identity_is_denied_when_engine_configured() {
        let router = test_router(Some(Arc::new(AllowOnly("alice"))));
        let anonymous = CallerContext {
            bearer: Some("garbage".to_string()),
            ..CallerContext::default()
        };
        assert!(matches!(
            router.config_for(&anonymous, "east-1").await,
            Err(RouterError::Forbidden { .. })
        ));
        // Without an engine the legacy deployment posture allows.
        let open = test_router(None);
        assert!(open.config_for(&anonymous, "east-1").await.is_ok());
    }
}
