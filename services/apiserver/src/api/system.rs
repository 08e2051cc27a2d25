//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Provides lightweight endpoints for service metadata and health checks.
//!
//! # Key invariants and assumptions
//! - Health checks must be fast and side-effect free.
//! - System info is derived from in-memory configuration.
//!
//! # Security considerations
//! - These endpoints are public and reveal which integrations are enabled.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::{Envelope, FeatureFlags, HealthStatus, SystemInfo, ok};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/api/v1/system/info",
    tag = "system",
    responses(
        (status = 200, description = "Version and enabled integrations", body = Envelope<SystemInfo>)
    )
)]
/// Return dashboard version and feature flags.
///
/// # What it does
/// Reports whether Keycloak and OpenFGA are configured, the fail-open
/// posture, and the storage backend.
///
/// # Why it exists
/// Lets operators and the UI discover the deployment mode at runtime.
///
/// # Errors
/// - Does not return errors.
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<Envelope<SystemInfo>> {
    ok(SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: FeatureFlags {
            keycloak: state.config.keycloak.enabled,
            openfga: state.config.openfga.is_configured(),
            fail_open: state.config.fail_open,
            storage: state.store.backend_name().to_string(),
        },
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Dashboard health", body = Envelope<HealthStatus>),
        (status = 500, description = "Storage unavailable", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Return dashboard health status.
///
/// # What it does
/// Probes the backing store and returns `ok` if healthy.
///
/// # Why it exists
/// Supports readiness/liveness checks and operational monitoring.
///
/// # Errors
/// - Returns 500 if storage health check fails.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<Envelope<HealthStatus>>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(ok(HealthStatus {
        status: "ok".to_string(),
        storage: state.store.backend_name().to_string(),
    }))
}
