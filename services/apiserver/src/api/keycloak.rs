//! Keycloak discovery and token validation endpoints.
use crate::api::error::{ApiError, api_bad_request, api_unauthorized};
use crate::api::types::{
    Envelope, KeycloakConfigResponse, KeycloakValidateRequest, KeycloakValidateResponse, ok,
};
use crate::app::AppState;
use crate::auth::authenticator::extract_bearer;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

#[utoipa::path(
    get,
    path = "/api/v1/keycloak/config",
    tag = "keycloak",
    responses(
        (status = 200, description = "Keycloak login settings for the UI", body = Envelope<KeycloakConfigResponse>)
    )
)]
/// Public Keycloak settings the login page needs.
///
/// # What it does
/// Returns `{enabled:false}` when Keycloak is off, otherwise the realm
/// coordinates and redirect URIs derived from `FRONTEND_URL`.
///
/// # Errors
/// - Does not return errors.
pub(crate) async fn keycloak_config(
    State(state): State<AppState>,
) -> Json<Envelope<KeycloakConfigResponse>> {
    let config = &state.config;
    if !config.keycloak.enabled {
        return ok(KeycloakConfigResponse {
            enabled: false,
            url: None,
            realm: None,
            client_id: None,
            redirect_uri: None,
            logout_redirect_uri: None,
        });
    }
    ok(KeycloakConfigResponse {
        enabled: true,
        url: Some(config.keycloak.url.clone()),
        realm: Some(config.keycloak.realm.clone()),
        client_id: Some(config.keycloak.client_id.clone()),
        redirect_uri: Some(config.keycloak_redirect_uri()),
        logout_redirect_uri: Some(config.keycloak_logout_redirect_uri()),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/keycloak/validate",
    tag = "keycloak",
    request_body = KeycloakValidateRequest,
    responses(
        (status = 200, description = "Token is a valid Keycloak token", body = Envelope<KeycloakValidateResponse>),
        (status = 400, description = "Keycloak is disabled or no token supplied", body = crate::api::types::ErrorEnvelope),
        (status = 401, description = "Token rejected", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Validate a token through the Keycloak validator only.
///
/// # What it does
/// Takes the token from the body, or the bearer header when the body has
/// none, and reports the identity Keycloak resolves.
///
/// # Why it exists
/// The UI checks a freshly obtained Keycloak token before storing it, without
/// the legacy fallback the authenticator would apply to HS256 tokens.
///
/// # Errors
/// - 400 if Keycloak is disabled or no token was supplied.
/// - 401 if the token does not validate.
pub(crate) async fn keycloak_validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<KeycloakValidateRequest>>,
) -> Result<Json<Envelope<KeycloakValidateResponse>>, ApiError> {
    let Some(validator) = state.authenticator.keycloak() else {
        return Err(api_bad_request("keycloak is not enabled"));
    };
    let token = body
        .and_then(|Json(body)| body.token)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| extract_bearer(&headers).map(str::to_string))
        .ok_or_else(|| api_bad_request("token is required"))?;

    let identity = validator.validate(token.trim()).await.map_err(|err| {
        tracing::info!(error = %err, "keycloak token validation failed");
        api_unauthorized("invalid token")
    })?;
    Ok(ok(KeycloakValidateResponse {
        valid: true,
        username: identity.username,
        email: identity.email,
        role: identity.role.as_str().to_string(),
        roles: identity.roles,
    }))
}
