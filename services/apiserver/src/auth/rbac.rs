//! Cluster-grant enforcement.
//!
//! # Purpose
//! Exposes the Casbin enforcer builder used to evaluate per-user cluster
//! grants recorded in user settings.
pub mod enforcer;

// Embed the Casbin model so deployments don't need a separate config file.
pub const MODEL_CONF: &str = include_str!("rbac/model.conf");
