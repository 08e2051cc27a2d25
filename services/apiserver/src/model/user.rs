//! Legacy user records and per-user cluster grants.
//!
//! # Purpose
//! Defines the records persisted by the dashboard store: local users for the
//! legacy login flow and user settings carrying cluster grants.
use dashboard_authz::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A local user. `password_hash` is an Argon2id PHC string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
}

impl UserRecord {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            username: self.username.clone(),
            role: self.role.as_str().to_string(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Public projection of a user; never carries credential material.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub role: String,
    pub created_at: String,
}

/// Cluster access grant attached to user settings.
///
/// `cluster` may be `*` to cover every member cluster.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct ClusterGrant {
    pub cluster: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq, Default)]
pub struct UserSettings {
    pub username: String,
    #[serde(default)]
    pub clusters: Vec<ClusterGrant>,
}
