//! Karmada dashboard API server library crate.
//!
//! # Purpose
//! Exposes the dashboard HTTP surface, dual-scheme authentication, the
//! member-cluster router, terminal sessions, configuration, and the dashboard
//! store for use by the binary and tests.
//!
//! # Notes
//! Handlers never build Kubernetes clients themselves; every client comes from
//! [`cluster::ClusterRouter`] so authorization runs before any cluster call.
pub mod api;
pub mod app;
pub mod auth;
pub mod cluster;
pub mod config;
pub mod model;
pub mod observability;
pub mod store;
pub mod terminal;
