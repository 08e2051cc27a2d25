//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the dashboard envelope and shared payload shapes for the REST API
//! and OpenAPI schema generation.
use crate::model::{ClusterGrant, UserSummary};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Uniform response wrapper: `code` mirrors the HTTP status.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

/// Envelope shape of every error response; `data` is always `null`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

/// Wrap `data` in a `200 success` envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: 200,
        message: "success".to_string(),
        data,
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Kubernetes service-account bearer, as an alternative to credentials.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub username: String,
    pub role: String,
    pub source: String,
    pub init_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterGrant>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct InitTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakConfigResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_redirect_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct KeycloakValidateRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct KeycloakValidateResponse {
    pub valid: bool,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserListResponse {
    pub items: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ClusterGrantsRequest {
    pub clusters: Vec<ClusterGrant>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub total_items: usize,
}

/// Paged listing of arbitrary Kubernetes objects.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    pub list_meta: ListMeta,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Value>,
}

/// Envelope around a single Kubernetes object.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ObjectEnvelope {
    pub code: u16,
    pub message: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Arbitrary Kubernetes manifest as accepted by create and replace.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Manifest(pub Value);

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ClusterListResponse {
    pub items: Vec<ClusterSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FeatureFlags {
    pub keycloak: bool,
    pub openfga: bool,
    pub fail_open: bool,
    pub storage: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub version: String,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub storage: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_has_code_message_data() {
        let Json(body) = ok(LoginResponse {
            token: "t".to_string(),
        });
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value, json!({"code": 200, "message": "success", "data": {"token": "t"}}));
    }

    #[test]
    fn disabled_keycloak_config_serializes_only_enabled() {
        let body = KeycloakConfigResponse {
            enabled: false,
            url: None,
            realm: None,
            client_id: None,
            redirect_uri: None,
            logout_redirect_uri: None,
        };
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"enabled": false}));
    }

    #[test]
    fn me_response_uses_camel_case() {
        let body = MeResponse {
            username: "admin".to_string(),
            role: "admin".to_string(),
            source: "legacy".to_string(),
            init_token: true,
            email: None,
            roles: Vec::new(),
            clusters: Vec::new(),
        };
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["initToken"], true);
        assert!(value.get("email").is_none());
    }
}
