//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every failure is rendered
//! as the dashboard envelope `{code, message, data}`.
//!
//! # Where it fits
//! Lower layers (authenticator, gate, router, store) return typed errors;
//! handlers translate them here. Nothing below the handler layer picks HTTP
//! statuses.
//!
//! # Key invariants and assumptions
//! - `body.code` always equals the numeric HTTP status.
//! - `body.data` is always `null` on errors.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorEnvelope;
use crate::auth::authenticator::AuthError;
use crate::auth::gate::GateError;
use crate::cluster::RouterError;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// # What it does
/// Couples an HTTP status code with the envelope body.
///
/// # Example
/// ```rust
/// use apiserver::api::error::api_not_found;
/// use axum::http::StatusCode;
///
/// let err = api_not_found("secret default/db not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// assert_eq!(err.body.code, 404);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorEnvelope,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build an error with an explicit status.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError {
        status,
        body: ErrorEnvelope {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        },
    }
}

/// 400 for malformed input.
pub fn api_bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

/// 401 for missing or invalid credentials.
pub fn api_unauthorized(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, message)
}

/// 403 when the caller is authenticated but not allowed.
pub fn api_forbidden(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::FORBIDDEN, message)
}

pub fn api_not_found(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, message)
}

pub fn api_conflict(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::CONFLICT, message)
}

/// Build a 500 Internal Server Error from a store error.
///
/// # What it does
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    // Log internal details server-side for debugging; return generic message.
    tracing::error!(error = ?err, "dashboard storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// Build a 500 Internal Server Error without a store error.
pub fn api_internal_message(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => api_not_found(format!("{what} not found")),
            StoreError::Conflict(what) => api_conflict(format!("{what} already exists")),
            other => api_internal("storage failure", &other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Backend(reason) => {
                tracing::error!(%reason, "authentication backend failure");
                api_internal_message("authentication backend unavailable")
            }
            other => api_unauthorized(other.to_string()),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unavailable(_) | GateError::Engine(_) => {
                tracing::error!(error = %err, "authorization engine failure");
                api_error(StatusCode::BAD_GATEWAY, "authorization engine failure")
            }
            GateError::Grants(store) => api_internal("failed to load cluster grants", &store),
            GateError::Policy(reason) => {
                tracing::error!(%reason, "cluster grant evaluation failed");
                api_internal_message("failed to evaluate cluster grants")
            }
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::Forbidden { .. } => api_forbidden(err.to_string()),
            RouterError::Authorization(gate) => gate.into(),
            RouterError::Unauthenticated(auth) => auth.into(),
            RouterError::Config(_) | RouterError::Client(_) => {
                tracing::error!(error = %err, "member cluster client construction failed");
                api_internal_message(err.to_string())
            }
        }
    }
}

/// Map a Kubernetes client error onto the envelope, passing API statuses through.
pub fn api_kube(err: kube::Error) -> ApiError {
    match err {
        kube::Error::Api(response) => {
            let status = StatusCode::from_u16(response.code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            api_error(status, response.message)
        }
        other => {
            tracing::error!(error = %other, "kubernetes request failed");
            api_error(StatusCode::BAD_GATEWAY, format!("kubernetes request failed: {other}"))
        }
    }
}
