//! Dashboard data model module.
//!
//! # Purpose
//! Re-exports the persisted user, user-settings, and cluster-grant records
//! shared by the API and store layers.
mod user;

pub use user::{ClusterGrant, UserRecord, UserSettings, UserSummary};
