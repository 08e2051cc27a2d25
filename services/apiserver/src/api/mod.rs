//! Dashboard HTTP API module.
//!
//! # Purpose
//! Exposes the route handler modules, the response envelope, and error
//! mapping shared by every handler.
pub mod clusters;
pub mod error;
pub mod keycloak;
pub mod login;
pub mod openapi;
pub mod resources;
pub mod system;
pub mod terminal;
pub mod types;
pub mod users;
