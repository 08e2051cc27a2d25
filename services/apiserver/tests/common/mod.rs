#![allow(dead_code)]

use apiserver::app::{AppState, seed_admin};
use apiserver::cluster::loader::ClusterConfigs;
use apiserver::cluster::probe::{ControlPlaneProbe, ProbeError};
use apiserver::config::DashboardConfig;
use apiserver::store::memory::InMemoryStore;
use apiserver::store::DashboardStore;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::RouterIntoService;
use std::sync::Arc;
use tower::ServiceExt;

pub const KARMADA_HOST: &str = "https://karmada.test:5443";
pub const ADMIN_PASSWORD: &str = "admin123";
/// Projected-style bearer for `system:serviceaccount:sandbox:admin`.
pub const GOOD_SA_TOKEN: &str =
    "eyJhbGciOiJSUzI1NiJ9.eyJzdWIiOiJzeXN0ZW06c2VydmljZWFjY291bnQ6c2FuZGJveDphZG1pbiJ9.sig";
/// Projected-style bearer for `system:serviceaccount:karmada-system:karmada-dashboard`.
pub const DASHBOARD_SA_TOKEN: &str =
    "eyJhbGciOiJSUzI1NiJ9.eyJzdWIiOiJzeXN0ZW06c2VydmljZWFjY291bnQ6a2FybWFkYS1zeXN0ZW06a2FybWFkYS1kYXNoYm9hcmQifQ.sig";
pub const DASHBOARD_SA_SUBJECT: &str = "system:serviceaccount:karmada-system:karmada-dashboard";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Control plane that accepts only the two service-account bearers above.
pub struct FakeProbe;

#[async_trait]
impl ControlPlaneProbe for FakeProbe {
    async fn probe(&self, token: &str) -> Result<(), ProbeError> {
        if token == GOOD_SA_TOKEN || token == DASHBOARD_SA_TOKEN {
            Ok(())
        } else {
            Err(ProbeError::Rejected(401))
        }
    }
}

pub fn test_configs() -> ClusterConfigs {
    let uri: axum::http::Uri = KARMADA_HOST.parse().expect("uri");
    ClusterConfigs {
        karmada: kube::Config::new(uri.clone()),
        management: kube::Config::new(uri),
        karmada_host: KARMADA_HOST.to_string(),
    }
}

pub async fn state_with(config: DashboardConfig) -> AppState {
    state_with_store(config, Arc::new(InMemoryStore::new())).await
}

pub async fn state_with_store(config: DashboardConfig, store: Arc<dyn DashboardStore>) -> AppState {
    seed_admin(store.as_ref(), ADMIN_PASSWORD)
        .await
        .expect("seed admin");
    AppState::new(config, store, test_configs(), Arc::new(FakeProbe)).expect("state")
}

pub async fn test_state() -> AppState {
    state_with(DashboardConfig::local_defaults()).await
}

/// Log in through the API and return the dashboard token.
pub async fn login(app: &RouterIntoService<Body, ()>, username: &str, password: &str) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"username": username, "password": password}).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("login");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    body["data"]["token"].as_str().expect("token").to_string()
}
