//! User and cluster-grant administration handlers.
//!
//! # Purpose
//! Manages the local users behind legacy login and the per-user cluster grants
//! the authorization gate consults for Keycloak basic users. All routes sit
//! behind the admin middleware.
use crate::api::error::{ApiError, api_bad_request, api_internal_message};
use crate::api::types::{ClusterGrantsRequest, CreateUserRequest, Envelope, UserListResponse, ok};
use crate::app::AppState;
use crate::auth::password::hash_password;
use crate::model::{UserRecord, UserSettings, UserSummary};
use axum::Json;
use axum::extract::{Path, State};
use dashboard_authz::Role;

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "List users", body = Envelope<UserListResponse>)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Envelope<UserListResponse>>, ApiError> {
    let mut items: Vec<UserSummary> = state
        .store
        .list_users()
        .await?
        .iter()
        .map(UserRecord::summary)
        .collect();
    items.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(ok(UserListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = Envelope<UserSummary>),
        (status = 400, description = "Invalid username, password, or role", body = crate::api::types::ErrorEnvelope),
        (status = 409, description = "User already exists", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Create a local user.
///
/// # What it does
/// Hashes the password with Argon2id and stores the record. The role
/// defaults to `basic_user`.
///
/// # Errors
/// - 400 for an empty username or password, a username containing `:`, or an
///   unknown role.
/// - 409 if the username is taken.
pub(crate) async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<Envelope<UserSummary>>, ApiError> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(api_bad_request("username and password are required"));
    }
    // `:` is reserved for `system:serviceaccount:` subjects.
    if username.contains(':') {
        return Err(api_bad_request("username must not contain ':'"));
    }
    let role = match body.role.as_deref() {
        None | Some("") => Role::BasicUser,
        Some(value) => value.parse::<Role>().map_err(api_bad_request)?,
    };
    let password_hash = hash_password(&body.password).map_err(|err| {
        tracing::error!(error = %err, "failed to hash password");
        api_internal_message("failed to hash password")
    })?;
    let record = UserRecord {
        username: username.to_string(),
        password_hash,
        role,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let created = state.store.create_user(record).await?;
    tracing::info!(user = %created.username, role = %created.role, "user created");
    Ok(ok(created.summary()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(
        ("username" = String, Path, description = "User name")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn delete_user(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    state.store.delete_user(&username).await?;
    tracing::info!(user = %username, "user deleted");
    Ok(ok(None))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{username}/clusters",
    tag = "users",
    params(
        ("username" = String, Path, description = "User name")
    ),
    responses(
        (status = 200, description = "Cluster grants of the user", body = Envelope<UserSettings>)
    )
)]
/// Read a user's cluster grants. Users without settings have none.
pub(crate) async fn get_user_clusters(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<UserSettings>>, ApiError> {
    let settings = state
        .store
        .user_settings(&username)
        .await?
        .unwrap_or_else(|| UserSettings {
            username: username.clone(),
            clusters: Vec::new(),
        });
    Ok(ok(settings))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{username}/clusters",
    tag = "users",
    params(
        ("username" = String, Path, description = "User name")
    ),
    request_body = ClusterGrantsRequest,
    responses(
        (status = 200, description = "Cluster grants replaced", body = Envelope<UserSettings>),
        (status = 400, description = "Grant without a cluster name", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Replace a user's cluster grants.
///
/// # What it does
/// Stores `[{cluster, roles}]` wholesale; `*` grants every cluster. Grants
/// apply to Keycloak identities too, which have no local user record, so the
/// user does not have to exist.
///
/// # Errors
/// - 400 if any grant has an empty cluster name.
pub(crate) async fn put_user_clusters(
    Path(username): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ClusterGrantsRequest>,
) -> Result<Json<Envelope<UserSettings>>, ApiError> {
    if body.clusters.iter().any(|grant| grant.cluster.trim().is_empty()) {
        return Err(api_bad_request("cluster name is required for every grant"));
    }
    let settings = state
        .store
        .put_user_settings(UserSettings {
            username: username.clone(),
            clusters: body.clusters,
        })
        .await?;
    tracing::info!(user = %username, grants = settings.clusters.len(), "cluster grants updated");
    Ok(ok(settings))
}
