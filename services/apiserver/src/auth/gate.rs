//! Cluster authorization gate.
//!
//! # Purpose
//! Maps a resolved [`Identity`] and a requested member cluster to an
//! allow/deny decision.
//!
//! # Decision table
//! - Keycloak `admin`: allowed on every cluster without consulting anything.
//! - Keycloak `basic_user`: allowed when the user's settings carry a grant
//!   for the cluster (evaluated with the Casbin grant enforcer).
//! - Legacy identities: a relationship check `user:<name> <relation>
//!   cluster:<name>` against the authorization engine.
//!
//! # Engine unavailability
//! When no engine is configured, or the engine cannot be reached, the
//! decision depends on `fail_open`: `true` allows with a warning (legacy
//! deployments had no per-cluster ACL), `false` returns
//! [`GateError::Unavailable`]. An engine that answers with an error is always
//! a hard failure, so "explicitly denied" stays distinct from "could not
//! determine".
use crate::auth::openfga::{CheckError, RelationshipChecker};
use crate::auth::rbac::enforcer::grants_cluster;
use crate::model::UserSettings;
use crate::store::{StoreError, UserStore};
use dashboard_authz::{Identity, IdentitySource, Role, cluster_object};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("authorization engine unavailable: {0}")]
    Unavailable(String),
    #[error("authorization engine error: {0}")]
    Engine(String),
    #[error("failed to load cluster grants: {0}")]
    Grants(#[from] StoreError),
    #[error("failed to evaluate cluster grants: {0}")]
    Policy(String),
}

#[derive(Clone)]
pub struct AuthorizationGate {
    checker: Option<Arc<dyn RelationshipChecker>>,
    grants: Arc<dyn UserStore>,
    relation: String,
    fail_open: bool,
}

impl AuthorizationGate {
    pub fn new(
        checker: Option<Arc<dyn RelationshipChecker>>,
        grants: Arc<dyn UserStore>,
        relation: impl Into<String>,
        fail_open: bool,
    ) -> Self {
        Self {
            checker,
            grants,
            relation: relation.into(),
            fail_open,
        }
    }

    pub fn engine_configured(&self) -> bool {
        self.checker.is_some()
    }

    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    pub async fn authorize(&self, identity: &Identity, cluster: &str) -> Result<bool, GateError> {
        if cluster.is_empty() {
            return Ok(true);
        }
        let result = match (identity.source, identity.role) {
            (IdentitySource::Keycloak, Role::Admin) => Ok(true),
            (IdentitySource::Keycloak, Role::BasicUser) => {
                self.authorize_by_grants(identity, cluster).await
            }
            (IdentitySource::Legacy, _) => self.authorize_by_engine(identity, cluster).await,
        };
        let decision = match &result {
            Ok(true) => "allow",
            Ok(false) => "deny",
            Err(_) => "error",
        };
        metrics::counter!(
            "dashboard_authz_decisions_total",
            "source" => identity.source.as_str(),
            "decision" => decision
        )
        .increment(1);
        tracing::debug!(
            user = %identity.username,
            source = %identity.source,
            cluster,
            decision,
            "cluster authorization decision"
        );
        result
    }

    async fn authorize_by_grants(
        &self,
        identity: &Identity,
        cluster: &str,
    ) -> Result<bool, GateError> {
        let settings = self
            .grants
            .user_settings(&identity.username)
            .await?
            .unwrap_or_else(|| UserSettings {
                username: identity.username.clone(),
                clusters: Vec::new(),
            });
        grants_cluster(&settings, cluster)
            .await
            .map_err(|err| GateError::Policy(err.to_string()))
    }

    async fn authorize_by_engine(
        &self,
        identity: &Identity,
        cluster: &str,
    ) -> Result<bool, GateError> {
        let Some(checker) = &self.checker else {
            return self.engine_unavailable(cluster, "authorization engine not configured");
        };
        match checker
            .check(&identity.subject(), &self.relation, &cluster_object(cluster))
            .await
        {
            Ok(allowed) => Ok(allowed),
            Err(CheckError::Unavailable(reason)) => self.engine_unavailable(cluster, &reason),
            Err(CheckError::Engine(reason)) => Err(GateError::Engine(reason)),
        }
    }

    fn engine_unavailable(&self, cluster: &str, reason: &str) -> Result<bool, GateError> {
        if self.fail_open {
            tracing::warn!(cluster, reason, "authorization engine unavailable, allowing (fail_open)");
            Ok(true)
        } else {
            tracing::warn!(cluster, reason, "authorization engine unavailable, denying");
            Err(GateError::Unavailable(reason.to_string()))
        }
    }
}
