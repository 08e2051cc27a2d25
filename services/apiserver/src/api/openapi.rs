//! OpenAPI schema aggregation for the dashboard API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for docs
//! and client generation.
use crate::api::{
    clusters, keycloak, login, resources, system, terminal,
    types::{
        ClusterGrantsRequest, ClusterListResponse, ClusterSummary, CreateUserRequest,
        ErrorEnvelope, FeatureFlags, HealthStatus, InitTokenRequest, KeycloakConfigResponse,
        KeycloakValidateRequest, KeycloakValidateResponse, ListMeta, LoginRequest, LoginResponse,
        Manifest, MeResponse, ObjectEnvelope, ResourceList, SystemInfo, UserListResponse,
    },
    users,
};
use crate::model::{ClusterGrant, UserSettings, UserSummary};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "karmada-dashboard",
        version = "v1",
        description = "Karmada dashboard HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        login::login,
        login::me,
        login::init_token,
        login::clear_init_token,
        keycloak::keycloak_config,
        keycloak::keycloak_validate,
        users::list_users,
        users::create_user,
        users::delete_user,
        users::get_user_clusters,
        users::put_user_clusters,
        clusters::list_clusters,
        resources::list_resources,
        resources::get_resource,
        resources::create_resource,
        resources::replace_resource,
        resources::delete_resource,
        resources::list_member_resources,
        resources::get_member_resource,
        resources::create_member_resource,
        resources::replace_member_resource,
        resources::delete_member_resource,
        terminal::pod_terminal,
        terminal::node_terminal
    ),
    components(schemas(
        ErrorEnvelope,
        ObjectEnvelope,
        Manifest,
        FeatureFlags,
        SystemInfo,
        HealthStatus,
        LoginRequest,
        LoginResponse,
        MeResponse,
        InitTokenRequest,
        KeycloakConfigResponse,
        KeycloakValidateRequest,
        KeycloakValidateResponse,
        CreateUserRequest,
        UserListResponse,
        UserSummary,
        UserSettings,
        ClusterGrant,
        ClusterGrantsRequest,
        ClusterSummary,
        ClusterListResponse,
        ListMeta,
        ResourceList
    )),
    tags(
        (name = "system", description = "System and health endpoints"),
        (name = "auth", description = "Login, identity and service-account token"),
        (name = "keycloak", description = "Keycloak discovery and validation"),
        (name = "users", description = "Local users and cluster grants"),
        (name = "resources", description = "Control-plane resources"),
        (name = "member", description = "Member clusters and their resources"),
        (name = "terminal", description = "Pod and node shells over WebSocket")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_dashboard_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/login",
            "/api/v1/me",
            "/api/v1/keycloak/config",
            "/api/v1/member/{cluster}/resources/{kind}",
            "/api/v1/terminal",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn manifest_schema_is_a_free_form_object() {
        let doc = serde_json::to_value(ApiDoc::openapi()).expect("serialize document");
        assert_eq!(doc["components"]["schemas"]["Manifest"]["type"], "object");

        let manifest: crate::api::types::Manifest =
            serde_json::from_value(serde_json::json!({"kind": "Namespace"})).expect("manifest");
        assert_eq!(manifest.0["kind"], "Namespace");
    }
}
