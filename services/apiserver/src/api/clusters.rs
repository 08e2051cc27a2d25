//! Member-cluster listing filtered by the caller's access.
use crate::api::error::{ApiError, api_kube};
use crate::api::types::{ClusterListResponse, ClusterSummary, Envelope, ok};
use crate::app::AppState;
use crate::auth::middleware::AuthContext;
use crate::cluster::kinds::KARMADA_CLUSTER;
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use kube::api::{Api, DynamicObject, ListParams};
use serde_json::Value;

/// Project a Karmada `Cluster` object onto the summary the UI shows.
pub(crate) fn summarize_cluster(object: &DynamicObject) -> Option<ClusterSummary> {
    let name = object.metadata.name.clone()?;
    let data = &object.data;
    let ready = data
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.get("type").and_then(Value::as_str) == Some("Ready"))
        })
        .and_then(|ready| ready.get("status").and_then(Value::as_str))
        .map(|status| status == "True");
    Some(ClusterSummary {
        name,
        ready,
        version: data
            .pointer("/status/kubernetesVersion")
            .and_then(Value::as_str)
            .map(str::to_string),
        sync_mode: data
            .pointer("/spec/syncMode")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/clusters",
    tag = "member",
    responses(
        (status = 200, description = "Member clusters the caller may access", body = Envelope<ClusterListResponse>),
        (status = 502, description = "Authorization engine failure", body = crate::api::types::ErrorEnvelope)
    )
)]
/// List Karmada member clusters visible to the caller.
///
/// # What it does
/// Lists `Cluster` objects on the control plane and keeps the ones the
/// authorization gate allows for the caller.
///
/// # Why it exists
/// The cluster picker must never offer a cluster whose resources would then
/// be refused.
///
/// # Errors
/// - 502 if the authorization engine fails for any cluster.
/// - Kubernetes API failures keep their status and message.
pub(crate) async fn list_clusters(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> Result<Json<Envelope<ClusterListResponse>>, ApiError> {
    let client = state.router.client_for(&auth.caller(&headers), "").await?;
    let api: Api<DynamicObject> = Api::all_with(client, &KARMADA_CLUSTER.api_resource());
    let list = api.list(&ListParams::default()).await.map_err(api_kube)?;

    let mut items = Vec::new();
    for summary in list.items.iter().filter_map(summarize_cluster) {
        if state
            .router
            .gate()
            .authorize(&auth.identity, &summary.name)
            .await?
        {
            items.push(summary);
        }
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ok(ClusterListResponse { items }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_reads_status_and_spec() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "cluster.karmada.io/v1alpha1",
            "kind": "Cluster",
            "metadata": {"name": "east-1"},
            "spec": {"syncMode": "Push"},
            "status": {
                "kubernetesVersion": "v1.29.2",
                "conditions": [
                    {"type": "Ready", "status": "True"}
                ]
            }
        }))
        .unwrap();
        let summary = summarize_cluster(&object).unwrap();
        assert_eq!(summary.name, "east-1");
        assert_eq!(summary.ready, Some(true));
        assert_eq!(summary.version.as_deref(), Some("v1.29.2"));
        assert_eq!(summary.sync_mode.as_deref(), Some("Push"));
    }

    #[test]
    fn summary_tolerates_missing_status() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "cluster.karmada.io/v1alpha1",
            "kind": "Cluster",
            "metadata": {"name": "west-2"}
        }))
        .unwrap();
        let summary = summarize_cluster(&object).unwrap();
        assert_eq!(summary.ready, None);
        assert_eq!(summary.version, None);
    }
}
