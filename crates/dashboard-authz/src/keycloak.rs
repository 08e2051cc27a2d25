//! Keycloak access-token claims and role derivation.
//!
//! # Purpose
//! Models the subset of a Keycloak access token the dashboard consumes and
//! maps its realm/client roles onto a dashboard [`Role`].
//!
//! # Key invariants
//! - Role derivation is a pure function of the claims and the admin-role list.
//! - Realm roles and the configured client's roles are merged; other clients'
//!   roles are ignored.
//!
//! # Examples
//! ```rust
//! use dashboard_authz::{Role, derive_role};
//!
//! let admin_roles = vec!["admin".to_string(), "dashboard-admin".to_string()];
//! let roles = vec!["editor".to_string(), "dashboard-admin".to_string()];
//! assert_eq!(derive_role(&roles, &admin_roles), Role::Admin);
//! ```
use crate::{Identity, IdentitySource, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_ADMIN_ROLES: [&str; 2] = ["admin", "dashboard-admin"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RoleSet>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleSet>,
}

impl KeycloakClaims {
    /// Realm roles followed by the roles granted on `client_id`, deduplicated.
    pub fn roles(&self, client_id: Option<&str>) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        let realm = self.realm_access.iter().flat_map(|set| set.roles.iter());
        let client = client_id
            .and_then(|id| self.resource_access.get(id))
            .into_iter()
            .flat_map(|set| set.roles.iter());
        for role in realm.chain(client) {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        roles
    }

    /// `preferred_username`, falling back to `sub`.
    pub fn username(&self) -> Option<String> {
        self.preferred_username
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.sub.clone()).filter(|sub| !sub.is_empty()))
    }

    pub fn into_identity(self, client_id: Option<&str>, admin_roles: &[String]) -> Option<Identity> {
        let username = self.username()?;
        let roles = self.roles(client_id);
        let role = derive_role(&roles, admin_roles);
        Some(
            Identity::new(username, role, IdentitySource::Keycloak)
                .with_email(self.email)
                .with_roles(roles),
        )
    }
}

pub fn derive_role(roles: &[String], admin_roles: &[String]) -> Role {
    if roles.iter().any(|role| admin_roles.contains(role)) {
        Role::Admin
    } else {
        Role::BasicUser
    }
}

pub fn default_admin_roles() -> Vec<String> {
    DEFAULT_ADMIN_ROLES.iter().map(|role| role.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roles(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn dashboard_admin_maps_to_admin() {
        let derived = derive_role(&roles(&["editor", "dashboard-admin"]), &default_admin_roles());
        assert_eq!(derived, Role::Admin);
    }

    #[test]
    fn editor_only_maps_to_basic_user() {
        let derived = derive_role(&roles(&["editor"]), &default_admin_roles());
        assert_eq!(derived, Role::BasicUser);
    }

    #[test]
    fn custom_admin_roles_are_honoured() {
        let admin_roles = roles(&["platform-owner"]);
        assert_eq!(derive_role(&roles(&["platform-owner"]), &admin_roles), Role::Admin);
        assert_eq!(derive_role(&roles(&["admin"]), &admin_roles), Role::BasicUser);
    }

    #[test]
    fn claims_merge_realm_and_client_roles() {
        let claims: KeycloakClaims = serde_json::from_value(json!({
            "sub": "0b6c",
            "preferred_username": "alice",
            "email": "alice@example.com",
            "realm_access": { "roles": ["offline_access", "editor"] },
            "resource_access": {
                "karmada-dashboard": { "roles": ["dashboard-admin", "editor"] },
                "account": { "roles": ["manage-account"] }
            }
        }))
        .unwrap();

        assert_eq!(
            claims.roles(Some("karmada-dashboard")),
            roles(&["offline_access", "editor", "dashboard-admin"])
        );
        let identity = claims
            .into_identity(Some("karmada-dashboard"), &default_admin_roles())
            .expect("identity");
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn username_falls_back_to_subject() {
        let claims: KeycloakClaims = serde_json::from_value(json!({ "sub": "0b6c" })).unwrap();
        assert_eq!(claims.username().as_deref(), Some("0b6c"));
        let empty = KeycloakClaims::default();
        assert!(empty.into_identity(None, &default_admin_roles()).is_none());
    }
}
