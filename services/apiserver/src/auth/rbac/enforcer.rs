//! Casbin enforcer builder for per-user cluster grants.
//!
//! # Purpose and responsibility
//! Constructs an in-memory Casbin enforcer from a user's
//! [`ClusterGrant`](crate::model::ClusterGrant) list so the authorization gate
//! can answer "may this user reach this cluster".
//!
//! # Key invariants and assumptions
//! - The Casbin model configuration is embedded in `MODEL_CONF`.
//! - Subjects are `user:<name>`, objects are `cluster:<name>`.
//! - A grant for cluster `*` matches every cluster through `keyMatch`.
use crate::auth::rbac::MODEL_CONF;
use crate::model::UserSettings;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi, Result};
use dashboard_authz::cluster_object;

/// Build an in-memory Casbin enforcer for one user's grants.
///
/// # Errors
/// - Returns Casbin errors for an invalid model or policy insertion failures.
///
/// # Example
/// ```rust
/// use apiserver::auth::rbac::enforcer::build_grant_enforcer;
/// use apiserver::model::UserSettings;
///
/// # async fn build() -> casbin::Result<()> {
/// let settings = UserSettings::default();
/// let _ = build_grant_enforcer(&settings).await?;
/// # Ok(())
/// # }
/// ```
pub async fn build_grant_enforcer(settings: &UserSettings) -> Result<Enforcer> {
    // Step 1: Load the embedded Casbin model.
    let model = DefaultModel::from_str(MODEL_CONF).await?;
    // Step 2: Use an in-memory adapter; grants are rebuilt per decision.
    let adapter = MemoryAdapter::default();
    let mut enforcer = Enforcer::new(model, adapter).await?;

    let subject = format!("user:{}", settings.username);
    for grant in &settings.clusters {
        if grant.cluster.trim().is_empty() {
            continue;
        }
        // Step 3: One policy row per granted cluster; duplicates are ignored.
        enforcer
            .add_policy(vec![subject.clone(), cluster_object(grant.cluster.trim())])
            .await?;
    }
    Ok(enforcer)
}

/// Evaluate whether `settings` grant access to `cluster`.
pub async fn grants_cluster(settings: &UserSettings, cluster: &str) -> Result<bool> {
    let enforcer = build_grant_enforcer(settings).await?;
    let subject = format!("user:{}", settings.username);
    enforcer.enforce((subject.as_str(), cluster_object(cluster).as_str()))
}
