//! Login, identity, and service-account token handlers.
//!
//! # Purpose
//! Issues legacy dashboard tokens, reports the caller's identity to the UI,
//! and manages the single Karmada service-account token the dashboard uses to
//! reach the control plane.
//!
//! # Key invariants
//! - `initToken` is a UI hint only; it never feeds an authorization decision.
//! - Keycloak identities always report `initToken = true`.
//! - A stored token is re-probed on every `/me`; nothing about it is cached.
use crate::api::error::{ApiError, api_bad_request, api_internal_message, api_unauthorized};
use crate::api::types::{Envelope, InitTokenRequest, LoginRequest, LoginResponse, MeResponse, ok};
use crate::app::AppState;
use crate::auth::middleware::AuthContext;
use crate::auth::password::verify_password;
use crate::model::ClusterGrant;
use axum::Json;
use axum::extract::{Extension, State};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashboard_authz::{Identity, IdentitySource, Role, SERVICE_ACCOUNT_PREFIX, ServiceAccountClaim};
use serde::Deserialize;

const INVALID_CREDENTIALS: &str = "invalid username or password";

#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Legacy dashboard token", body = Envelope<LoginResponse>),
        (status = 400, description = "Neither credentials nor token supplied", body = crate::api::types::ErrorEnvelope),
        (status = 401, description = "Invalid credentials or token", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Exchange credentials (or a service-account bearer) for a legacy token.
///
/// # What it does
/// Checks `{username, password}` against the user store, or probes a
/// `{token}` against the Karmada API server, then mints an HS256 token.
///
/// # Why it exists
/// The dashboard predates Keycloak; local users and service-account logins
/// still need a session token the authenticator understands.
///
/// # Errors
/// - 400 if the body carries neither credentials nor a token.
/// - 401 on wrong credentials or a token the control plane rejects.
/// - 500 if the store or signer fails.
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    if let Some(bearer) = body.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return service_account_login(&state, bearer).await;
    }
    if body.username.is_empty() || body.password.is_empty() {
        return Err(api_bad_request("username and password are required"));
    }

    let Some(user) = state.store.get_user(&body.username).await? else {
        tracing::info!(user = %body.username, "login for unknown user");
        return Err(api_unauthorized(INVALID_CREDENTIALS));
    };
    if !verify_password(&body.password, &user.password_hash) {
        tracing::info!(user = %body.username, "login with wrong password");
        return Err(api_unauthorized(INVALID_CREDENTIALS));
    }

    let token = state
        .issuer
        .mint(&user.username, Some(user.role), None)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to sign dashboard token");
            api_internal_message("failed to issue token")
        })?;
    tracing::info!(user = %user.username, role = %user.role, "user logged in");
    Ok(ok(LoginResponse { token }))
}

async fn service_account_login(
    state: &AppState,
    bearer: &str,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    if let Err(err) = state.probe.probe(bearer).await {
        tracing::info!(error = %err, "service-account login rejected");
        return Err(api_unauthorized("invalid token"));
    }
    let account = service_account_from_token(bearer);
    let subject = account.subject();
    let role = if state.config.is_admin_service_account(&subject) {
        Role::Admin
    } else {
        Role::BasicUser
    };
    let token = state
        .issuer
        .mint("", Some(role), Some(account))
        .map_err(|err| {
            tracing::error!(error = %err, "failed to sign dashboard token");
            api_internal_message("failed to issue token")
        })?;
    tracing::info!(account = %subject, %role, "service account logged in");
    Ok(ok(LoginResponse { token }))
}

#[derive(Deserialize)]
struct ServiceAccountPayload {
    #[serde(default)]
    sub: Option<String>,
}

/// Name the service account behind a Kubernetes bearer.
///
/// Projected tokens carry `sub: system:serviceaccount:<ns>:<name>`; anything
/// else gets a generic name. Either way the resulting username is a
/// `system:serviceaccount:` subject, which no local user can hold.
pub(crate) fn service_account_from_token(token: &str) -> ServiceAccountClaim {
    let subject = token
        .split('.')
        .nth(1)
        .and_then(|payload| URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok())
        .and_then(|bytes| serde_json::from_slice::<ServiceAccountPayload>(&bytes).ok())
        .and_then(|payload| payload.sub);
    if let Some(subject) = subject
        && let Some(rest) = subject.strip_prefix(SERVICE_ACCOUNT_PREFIX)
        && let Some((namespace, name)) = rest.split_once(':')
    {
        return ServiceAccountClaim {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        };
    }
    ServiceAccountClaim {
        name: "service-account".to_string(),
        namespace: None,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "auth",
    responses(
        (status = 200, description = "Caller identity", body = Envelope<MeResponse>),
        (status = 401, description = "Missing or invalid token", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Describe the authenticated caller.
///
/// # What it does
/// Returns username, role and source, the `initToken` flag, Keycloak email
/// and roles, and any cluster grants recorded for the user.
///
/// # Why it exists
/// The UI gates the init-token screen and cluster pickers on this payload.
///
/// # Errors
/// - 401 from the identity middleware. Store or probe failures degrade the
///   optional fields instead of failing the request.
pub(crate) async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<Envelope<MeResponse>> {
    let identity = auth.identity;
    let init_token = init_token_ready(&state, &identity).await;
    let clusters = cluster_grants(&state, &identity.username).await;
    ok(MeResponse {
        username: identity.username,
        role: identity.role.as_str().to_string(),
        source: identity.source.as_str().to_string(),
        init_token,
        email: identity.email,
        roles: identity.roles,
        clusters,
    })
}

async fn init_token_ready(state: &AppState, identity: &Identity) -> bool {
    if identity.source == IdentitySource::Keycloak {
        return true;
    }
    match state.store.service_account_token().await {
        Ok(Some(token)) => match state.probe.probe(&token).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "stored service-account token is not usable");
                false
            }
        },
        Ok(None) => false,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read service-account token");
            false
        }
    }
}

async fn cluster_grants(state: &AppState, username: &str) -> Vec<ClusterGrant> {
    match state.store.user_settings(username).await {
        Ok(settings) => settings.map(|s| s.clusters).unwrap_or_default(),
        Err(err) => {
            tracing::warn!(user = %username, error = %err, "failed to load cluster grants");
            Vec::new()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/init-token",
    tag = "auth",
    request_body = InitTokenRequest,
    responses(
        (status = 200, description = "Token stored"),
        (status = 400, description = "Token rejected by the control plane", body = crate::api::types::ErrorEnvelope),
        (status = 403, description = "Caller is not an administrator", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Store the Karmada service-account token after probing it.
///
/// # What it does
/// Probes the token against the Karmada discovery endpoint and, only if it
/// is accepted, replaces the stored value.
///
/// # Errors
/// - 400 if the token is empty, invalid, or the control plane is unreachable.
/// - 500 if the store write fails.
pub(crate) async fn init_token(
    State(state): State<AppState>,
    Json(body): Json<InitTokenRequest>,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(api_bad_request("token is required"));
    }
    if let Err(err) = state.probe.probe(token).await {
        tracing::warn!(error = %err, "refusing to store unusable service-account token");
        return Err(api_bad_request(format!("token validation failed: {err}")));
    }
    state.store.put_service_account_token(token).await?;
    tracing::info!("service-account token stored");
    Ok(ok(None))
}

#[utoipa::path(
    delete,
    path = "/api/v1/init-token",
    tag = "auth",
    responses(
        (status = 200, description = "Token cleared"),
        (status = 403, description = "Caller is not an administrator", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn clear_init_token(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    state.store.clear_service_account_token().await?;
    tracing::info!("service-account token cleared");
    Ok(ok(None))
}
