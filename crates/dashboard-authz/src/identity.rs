//! Resolved caller identity.
//!
//! # Purpose
//! Represents the projection of a validated bearer token that handlers and the
//! authorization gate reason about.
//!
//! # Key invariants
//! - An identity is derived per request and never persisted on its own.
//! - `source` records which trust root validated the token.
//!
//! # Examples
//! ```rust
//! use dashboard_authz::{Identity, IdentitySource, Role};
//!
//! let identity = Identity::new("alice", Role::BasicUser, IdentitySource::Keycloak);
//! assert!(!identity.is_admin());
//! assert_eq!(identity.subject(), "user:alice");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dashboard role carried by an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    BasicUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::BasicUser => "basic_user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    // Legacy tokens sometimes carry `basic` or `user`; treat anything
    // that is not an admin spelling as a basic user.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "basic_user" | "basic-user" | "basic" | "user" => Ok(Role::BasicUser),
            "" => Err("empty role".to_string()),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Trust root that validated the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Legacy,
    Keycloak,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Legacy => "legacy",
            IdentitySource::Keycloak => "keycloak",
        }
    }
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
    pub source: IdentitySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role, source: IdentitySource) -> Self {
        Self {
            username: username.into(),
            role,
            source,
            email: None,
            roles: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Relationship subject used when querying the authorization engine.
    pub fn subject(&self) -> String {
        format!("user:{}", self.username)
    }
}

/// Relationship object naming a member cluster.
pub fn cluster_object(cluster: &str) -> String {
    format!("cluster:{cluster}")
}
