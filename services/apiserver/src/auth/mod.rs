//! Dashboard authentication and authorization modules.
//!
//! # Purpose
//! Groups the dual-scheme authenticator and its legacy/Keycloak validators,
//! the request middleware, the cluster authorization gate with its OpenFGA
//! client and Casbin grant enforcer, and password hashing.
pub mod authenticator;
pub mod gate;
pub mod keycloak;
pub mod legacy;
pub mod middleware;
pub mod openfga;
pub mod password;
pub mod rbac;
