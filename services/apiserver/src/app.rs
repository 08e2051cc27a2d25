//! Dashboard HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! `AppState` is the only place collaborators are wired together; handlers
//! and tests receive everything through it, never through globals.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::authenticator::DualAuthenticator;
use crate::auth::gate::AuthorizationGate;
use crate::auth::keycloak::{KeycloakJwksValidator, KeycloakTokenValidator};
use crate::auth::legacy::StoreBackedLegacyValidator;
use crate::auth::middleware::{require_admin, require_identity};
use crate::auth::openfga::{OpenFgaClient, RelationshipChecker};
use crate::auth::password::hash_password;
use crate::cluster::ClusterRouter;
use crate::cluster::loader::ClusterConfigs;
use crate::cluster::probe::ControlPlaneProbe;
use crate::config::DashboardConfig;
use crate::model::UserRecord;
use crate::observability;
use crate::store::{DashboardStore, StoreError, UserStore};
use anyhow::Context;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use dashboard_authz::{LegacyTokenIssuer, LegacyTokenVerifier, Role};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

/// Leeway applied to `exp`/`iat` of legacy tokens.
const LEGACY_LEEWAY_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub store: Arc<dyn DashboardStore>,
    pub authenticator: DualAuthenticator,
    pub issuer: Arc<LegacyTokenIssuer>,
    pub router: ClusterRouter,
    pub probe: Arc<dyn ControlPlaneProbe>,
}

impl AppState {
    /// Wire validators, the authorization gate and the cluster router.
    ///
    /// Keycloak is wired only when enabled and OpenFGA only when both its URL
    /// and store id are set.
    pub fn new(
        config: DashboardConfig,
        store: Arc<dyn DashboardStore>,
        configs: ClusterConfigs,
        probe: Arc<dyn ControlPlaneProbe>,
    ) -> anyhow::Result<Self> {
        let secret = config
            .jwt_secret
            .clone()
            .context("dashboard JWT secret missing")?;
        let issuer = LegacyTokenIssuer::new(secret.as_bytes(), config.token_ttl)
            .context("build legacy token issuer")?;
        let verifier = LegacyTokenVerifier::new(secret.as_bytes(), LEGACY_LEEWAY_SECS)
            .context("build legacy token verifier")?;

        let users: Arc<dyn UserStore> = store.clone();
        let legacy = Arc::new(StoreBackedLegacyValidator::new(verifier, users.clone()));
        let keycloak: Option<Arc<dyn KeycloakTokenValidator>> = if config.keycloak.enabled {
            let validator = KeycloakJwksValidator::from_config(&config.keycloak);
            tracing::info!(issuer = validator.issuer(), "keycloak authentication enabled");
            Some(Arc::new(validator))
        } else {
            None
        };
        let authenticator = DualAuthenticator::new(keycloak, legacy);

        let checker: Option<Arc<dyn RelationshipChecker>> =
            match (&config.openfga.api_url, &config.openfga.store_id) {
                (Some(api_url), Some(store_id)) => {
                    let client = OpenFgaClient::new(
                        api_url,
                        store_id,
                        config.openfga.authorization_model_id.clone(),
                    )
                    .context("build openfga client")?;
                    tracing::info!(%api_url, %store_id, "openfga authorization enabled");
                    Some(Arc::new(client))
                }
                _ => {
                    tracing::warn!(
                        fail_open = config.fail_open,
                        "openfga not configured; member cluster access follows fail_open"
                    );
                    None
                }
            };
        let gate = AuthorizationGate::new(
            checker,
            users,
            config.openfga.relation.clone(),
            config.fail_open,
        );
        let router = ClusterRouter::new(configs, gate, authenticator.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            authenticator,
            issuer: Arc::new(issuer),
            router,
            probe,
        })
    }
}

/// Create the `admin` user when the store has no users yet.
///
/// Returns whether a user was created.
pub async fn seed_admin(store: &dyn UserStore, password: &str) -> Result<bool, StoreError> {
    if !store.list_users().await?.is_empty() {
        return Ok(false);
    }
    let password_hash = hash_password(password)
        .map_err(|err| StoreError::Unexpected(anyhow::anyhow!("hash admin password: {err}")))?;
    let record = UserRecord {
        username: "admin".to_string(),
        password_hash,
        role: Role::Admin,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    match store.create_user(record).await {
        Ok(_) => {
            tracing::info!("seeded admin user");
            Ok(true)
        }
        // Another replica seeded it first.
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            // Path only: WebSocket clients pass the bearer token in the query.
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    let admin = Router::new()
        .route(
            "/api/v1/init-token",
            post(api::login::init_token).delete(api::login::clear_init_token),
        )
        .route(
            "/api/v1/users",
            get(api::users::list_users).post(api::users::create_user),
        )
        .route(
            "/api/v1/users/:username",
            axum::routing::delete(api::users::delete_user),
        )
        .route(
            "/api/v1/users/:username/clusters",
            get(api::users::get_user_clusters).put(api::users::put_user_clusters),
        )
        // Node shells run privileged pods on the member's node.
        .route("/api/v1/node-terminal", get(api::terminal::node_terminal))
        .route_layer(middleware::from_fn(require_admin));

    let authenticated = Router::new()
        .route("/api/v1/me", get(api::login::me))
        .route("/api/v1/clusters", get(api::clusters::list_clusters))
        .route(
            "/api/v1/resources/:kind",
            get(api::resources::list_resources).post(api::resources::create_resource),
        )
        .route(
            "/api/v1/resources/:kind/:name",
            get(api::resources::get_resource)
                .put(api::resources::replace_resource)
                .delete(api::resources::delete_resource),
        )
        .route(
            "/api/v1/member/:cluster/resources/:kind",
            get(api::resources::list_member_resources)
                .post(api::resources::create_member_resource),
        )
        .route(
            "/api/v1/member/:cluster/resources/:kind/:name",
            get(api::resources::get_member_resource)
                .put(api::resources::replace_member_resource)
                .delete(api::resources::delete_member_resource),
        )
        .route("/api/v1/terminal", get(api::terminal::pod_terminal))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/api/v1/login", post(api::login::login))
        .route("/api/v1/keycloak/config", get(api::keycloak::keycloak_config))
        .route(
            "/api/v1/keycloak/validate",
            post(api::keycloak::keycloak_validate),
        )
        .route("/api/v1/system/info", get(api::system::system_info))
        .route("/api/v1/system/health", get(api::system::system_health))
        .merge(authenticated)
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/api/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
