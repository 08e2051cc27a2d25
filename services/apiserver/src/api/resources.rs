//! Generic resource handlers for the control plane and member clusters.
//!
//! # Purpose
//! Lists, reads, creates, replaces and deletes any kind in
//! [`crate::cluster::kinds::KINDS`], either on the Karmada control plane
//! (`/api/v1/resources/...`) or on one member cluster through the proxy
//! (`/api/v1/member/{cluster}/resources/...`).
//!
//! # Listing
//! Lists are shaped for the UI tables:
//! filter (`filterBy=name,<substr>`), then sort
//! (`sortBy=a,name` / `d,creationTimestamp`), then page (`page`,
//! `itemsPerPage`). `listMeta.totalItems` counts the filtered set.
//! Secret values are blanked and ArgoCD applications gain a status summary.
use crate::api::error::{ApiError, api_bad_request, api_internal_message, api_kube};
use crate::api::types::{Envelope, ListMeta, ResourceList, ok};
use crate::app::AppState;
use crate::auth::middleware::AuthContext;
use crate::cluster::CallerContext;
use crate::cluster::kinds::{self, ResourceKind};
use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams, TypeMeta};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use utoipa::IntoParams;

/// Label that keeps Karmada from propagating a namespace to member clusters.
pub const SKIP_AUTO_PROPAGATION_LABEL: &str = "namespace.karmada.io/skip-auto-propagation";

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResourceQuery {
    /// Namespace; omitted lists across all namespaces.
    pub namespace: Option<String>,
    /// `name,<substring>` or `namespace,<substring>`.
    pub filter_by: Option<String>,
    /// `a,name`, `d,name`, `a,creationTimestamp` or `d,creationTimestamp`.
    pub sort_by: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub items_per_page: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    Name,
    CreationTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListShape {
    filter: Vec<(String, String)>,
    sort: Option<(SortField, bool)>,
    page: Option<(usize, usize)>,
}

impl ListShape {
    fn parse(query: &ResourceQuery) -> Result<Self, ApiError> {
        let mut filter = Vec::new();
        if let Some(raw) = query.filter_by.as_deref().filter(|raw| !raw.is_empty()) {
            let parts: Vec<&str> = raw.split(',').collect();
            if parts.len() % 2 != 0 {
                return Err(api_bad_request(format!("invalid filterBy {raw:?}")));
            }
            for pair in parts.chunks(2) {
                match pair[0] {
                    "name" | "namespace" => {
                        filter.push((pair[0].to_string(), pair[1].to_ascii_lowercase()))
                    }
                    other => return Err(api_bad_request(format!("cannot filter by {other}"))),
                }
            }
        }

        let sort = match query.sort_by.as_deref().filter(|raw| !raw.is_empty()) {
            None => None,
            Some(raw) => {
                let (direction, field) = raw
                    .split_once(',')
                    .ok_or_else(|| api_bad_request(format!("invalid sortBy {raw:?}")))?;
                let ascending = match direction {
                    "a" => true,
                    "d" => false,
                    _ => return Err(api_bad_request(format!("invalid sort direction {direction}"))),
                };
                let field = match field {
                    "name" => SortField::Name,
                    "creationTimestamp" => SortField::CreationTimestamp,
                    other => return Err(api_bad_request(format!("cannot sort by {other}"))),
                };
                Some((field, ascending))
            }
        };

        let page = match query.items_per_page {
            Some(0) | None => None,
            Some(per_page) => Some((query.page.unwrap_or(1).max(1), per_page)),
        };
        Ok(Self { filter, sort, page })
    }
}

fn metadata_str<'a>(item: &'a Value, field: &str) -> &'a str {
    item.get("metadata")
        .and_then(|meta| meta.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn shape_list(items: Vec<Value>, shape: &ListShape) -> ResourceList {
    let mut items: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            shape.filter.iter().all(|(field, needle)| {
                metadata_str(item, field).to_ascii_lowercase().contains(needle.as_str())
            })
        })
        .collect();

    if let Some((field, ascending)) = shape.sort {
        let key = match field {
            SortField::Name => "name",
            // RFC 3339 timestamps in UTC order lexically.
            SortField::CreationTimestamp => "creationTimestamp",
        };
        items.sort_by(|a, b| {
            let order = metadata_str(a, key)
                .cmp(metadata_str(b, key))
                .then_with(|| metadata_str(a, "name").cmp(metadata_str(b, "name")));
            if ascending { order } else { order.reverse() }
        });
    }

    let total_items = items.len();
    let items = match shape.page {
        Some((page, per_page)) => items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect(),
        None => items,
    };
    ResourceList {
        list_meta: ListMeta { total_items },
        items,
    }
}

/// Strip what list views never show: managed fields and secret values.
fn redact_for_list(kind: &ResourceKind, item: &mut Value) {
    if let Some(meta) = item.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
    }
    if kind.name != "secret" {
        return;
    }
    if let Some(object) = item.as_object_mut() {
        object.remove("stringData");
        if let Some(data) = object.get_mut("data").and_then(Value::as_object_mut) {
            for value in data.values_mut() {
                *value = Value::String(String::new());
            }
        }
    }
}

/// Attach `{syncStatus, healthStatus}` to an ArgoCD application.
fn summarize_application(item: &mut Value) {
    let status = item.get("status");
    let pick = |path: &[&str]| -> String {
        let mut node = status;
        for key in path {
            node = node.and_then(|value| value.get(*key));
        }
        node.and_then(Value::as_str).unwrap_or("Unknown").to_string()
    };
    let summary = json!({
        "syncStatus": pick(&["sync", "status"]),
        "healthStatus": pick(&["health", "status"]),
    });
    if let Some(object) = item.as_object_mut() {
        object.insert("summary".to_string(), summary);
    }
}

fn lookup_kind(name: &str) -> Result<&'static ResourceKind, ApiError> {
    kinds::lookup(name).ok_or_else(|| api_bad_request(format!("unsupported resource kind {name}")))
}

fn to_value(object: DynamicObject) -> Result<Value, ApiError> {
    serde_json::to_value(object).map_err(|err| {
        tracing::error!(error = %err, "failed to encode kubernetes object");
        api_internal_message("failed to encode kubernetes object")
    })
}

fn with_types(kind: &ResourceKind, mut object: DynamicObject) -> DynamicObject {
    if object.types.is_none() {
        let ar = kind.api_resource();
        object.types = Some(TypeMeta {
            api_version: ar.api_version,
            kind: ar.kind,
        });
    }
    object
}

async fn dynamic_api(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &ResourceKind,
    namespace: Option<&str>,
) -> Result<Api<DynamicObject>, ApiError> {
    let client = state.router.client_for(caller, cluster).await?;
    let ar = kind.api_resource();
    Ok(match namespace {
        Some(namespace) if kind.namespaced => Api::namespaced_with(client, namespace, &ar),
        _ => Api::all_with(client, &ar),
    })
}

fn object_namespace(query: &ResourceQuery) -> &str {
    query
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or("default")
}

async fn list_in(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &str,
    query: ResourceQuery,
) -> Result<Json<Envelope<ResourceList>>, ApiError> {
    let kind = lookup_kind(kind)?;
    let shape = ListShape::parse(&query)?;
    let namespace = query.namespace.as_deref().filter(|ns| !ns.is_empty());
    let api = dynamic_api(state, caller, cluster, kind, namespace).await?;
    let list = api.list(&ListParams::default()).await.map_err(api_kube)?;

    let mut items = Vec::with_capacity(list.items.len());
    for object in list.items {
        let mut item = to_value(with_types(kind, object))?;
        redact_for_list(kind, &mut item);
        if kind.name == "application" {
            summarize_application(&mut item);
        }
        items.push(item);
    }
    Ok(ok(shape_list(items, &shape)))
}

async fn get_in(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &str,
    name: &str,
    query: ResourceQuery,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let kind = lookup_kind(kind)?;
    let api = dynamic_api(state, caller, cluster, kind, Some(object_namespace(&query))).await?;
    let object = api.get(name).await.map_err(api_kube)?;
    let mut item = to_value(with_types(kind, object))?;
    if kind.name == "application" {
        summarize_application(&mut item);
    }
    Ok(ok(item))
}

/// Expand `{name, skipAutoPropagation}` into a Namespace manifest.
fn namespace_manifest(body: Value) -> Value {
    let is_shorthand = body.get("metadata").is_none() && body.get("name").is_some();
    if !is_shorthand {
        return body;
    }
    let name = body.get("name").cloned().unwrap_or(Value::Null);
    let mut metadata = Map::new();
    metadata.insert("name".to_string(), name);
    if body.get("skipAutoPropagation").and_then(Value::as_bool) == Some(true) {
        let mut labels = Map::new();
        labels.insert(
            SKIP_AUTO_PROPAGATION_LABEL.to_string(),
            Value::String("true".to_string()),
        );
        metadata.insert("labels".to_string(), Value::Object(labels));
    }
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": Value::Object(metadata),
    })
}

fn decode_object(kind: &ResourceKind, body: Value) -> Result<DynamicObject, ApiError> {
    let body = if kind.name == "namespace" {
        namespace_manifest(body)
    } else {
        body
    };
    let object: DynamicObject = serde_json::from_value(body)
        .map_err(|err| api_bad_request(format!("invalid {} manifest: {err}", kind.name)))?;
    if object.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return Err(api_bad_request("metadata.name is required"));
    }
    Ok(with_types(kind, object))
}

async fn create_in(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &str,
    query: ResourceQuery,
    body: Value,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let kind = lookup_kind(kind)?;
    let mut object = decode_object(kind, body)?;
    let namespace = object
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| object_namespace(&query).to_string());
    if kind.namespaced {
        object.metadata.namespace = Some(namespace.clone());
    }
    let api = dynamic_api(state, caller, cluster, kind, Some(&namespace)).await?;
    let created = api
        .create(&PostParams::default(), &object)
        .await
        .map_err(api_kube)?;
    tracing::info!(
        kind = kind.name,
        cluster,
        name = created.metadata.name.as_deref().unwrap_or_default(),
        "resource created"
    );
    Ok(ok(to_value(created)?))
}

async fn replace_in(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &str,
    name: &str,
    query: ResourceQuery,
    body: Value,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let kind = lookup_kind(kind)?;
    let object = decode_object(kind, body)?;
    if object.metadata.name.as_deref() != Some(name) {
        return Err(api_bad_request("metadata.name does not match the path"));
    }
    let namespace = object
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| object_namespace(&query).to_string());
    let api = dynamic_api(state, caller, cluster, kind, Some(&namespace)).await?;
    let replaced = api
        .replace(name, &PostParams::default(), &object)
        .await
        .map_err(api_kube)?;
    tracing::info!(kind = kind.name, cluster, name, "resource replaced");
    Ok(ok(to_value(replaced)?))
}

async fn delete_in(
    state: &AppState,
    caller: &CallerContext,
    cluster: &str,
    kind: &str,
    name: &str,
    query: ResourceQuery,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    let kind = lookup_kind(kind)?;
    let api = dynamic_api(state, caller, cluster, kind, Some(object_namespace(&query))).await?;
    api.delete(name, &DeleteParams::default())
        .await
        .map_err(api_kube)?;
    tracing::info!(kind = kind.name, cluster, name, "resource deleted");
    Ok(ok(None))
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{kind}",
    tag = "resources",
    params(
        ("kind" = String, Path, description = "Resource kind, e.g. deployment"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Filtered, sorted, paged list", body = Envelope<ResourceList>),
        (status = 400, description = "Unknown kind or malformed query", body = crate::api::types::ErrorEnvelope)
    )
)]
/// List objects of one kind on the Karmada control plane.
///
/// # Errors
/// - 400 for an unknown kind or malformed `filterBy`/`sortBy`.
/// - Kubernetes API failures keep their status and message.
pub(crate) async fn list_resources(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<ResourceList>>, ApiError> {
    list_in(&state, &auth.caller(&headers), "", &kind, query).await
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{kind}/{name}",
    tag = "resources",
    params(
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Object", body = crate::api::types::ObjectEnvelope),
        (status = 404, description = "Object not found", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn get_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((kind, name)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    get_in(&state, &auth.caller(&headers), "", &kind, &name, query).await
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{kind}",
    tag = "resources",
    params(
        ("kind" = String, Path, description = "Resource kind"),
        ResourceQuery
    ),
    request_body = crate::api::types::Manifest,
    responses(
        (status = 200, description = "Created object", body = crate::api::types::ObjectEnvelope),
        (status = 400, description = "Invalid manifest", body = crate::api::types::ErrorEnvelope),
        (status = 409, description = "Object already exists", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Create an object on the control plane.
///
/// Namespaces also accept the shorthand `{name, skipAutoPropagation}`.
pub(crate) async fn create_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(query): Query<ResourceQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    create_in(&state, &auth.caller(&headers), "", &kind, query, body).await
}

#[utoipa::path(
    put,
    path = "/api/v1/resources/{kind}/{name}",
    tag = "resources",
    params(
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    request_body = crate::api::types::Manifest,
    responses(
        (status = 200, description = "Replaced object", body = crate::api::types::ObjectEnvelope),
        (status = 409, description = "Resource version conflict", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn replace_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((kind, name)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    replace_in(&state, &auth.caller(&headers), "", &kind, &name, query, body).await
}

#[utoipa::path(
    delete,
    path = "/api/v1/resources/{kind}/{name}",
    tag = "resources",
    params(
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Object deleted"),
        (status = 404, description = "Object not found", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn delete_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((kind, name)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    delete_in(&state, &auth.caller(&headers), "", &kind, &name, query).await
}

#[utoipa::path(
    get,
    path = "/api/v1/member/{cluster}/resources/{kind}",
    tag = "member",
    params(
        ("cluster" = String, Path, description = "Member cluster name"),
        ("kind" = String, Path, description = "Resource kind"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Filtered, sorted, paged list", body = Envelope<ResourceList>),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope),
        (status = 502, description = "Authorization engine failure", body = crate::api::types::ErrorEnvelope)
    )
)]
/// List objects of one kind on a member cluster.
///
/// # What it does
/// Authorizes the caller for `cluster`, then lists through Karmada's
/// cluster proxy.
///
/// # Errors
/// - 403 when the authorization gate denies the cluster.
/// - 502 when the authorization engine fails.
pub(crate) async fn list_member_resources(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((cluster, kind)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<ResourceList>>, ApiError> {
    list_in(&state, &auth.caller(&headers), &cluster, &kind, query).await
}

#[utoipa::path(
    get,
    path = "/api/v1/member/{cluster}/resources/{kind}/{name}",
    tag = "member",
    params(
        ("cluster" = String, Path, description = "Member cluster name"),
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Object", body = crate::api::types::ObjectEnvelope),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn get_member_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((cluster, kind, name)): Path<(String, String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    get_in(&state, &auth.caller(&headers), &cluster, &kind, &name, query).await
}

#[utoipa::path(
    post,
    path = "/api/v1/member/{cluster}/resources/{kind}",
    tag = "member",
    params(
        ("cluster" = String, Path, description = "Member cluster name"),
        ("kind" = String, Path, description = "Resource kind"),
        ResourceQuery
    ),
    request_body = crate::api::types::Manifest,
    responses(
        (status = 200, description = "Created object", body = crate::api::types::ObjectEnvelope),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn create_member_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((cluster, kind)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    create_in(&state, &auth.caller(&headers), &cluster, &kind, query, body).await
}

#[utoipa::path(
    put,
    path = "/api/v1/member/{cluster}/resources/{kind}/{name}",
    tag = "member",
    params(
        ("cluster" = String, Path, description = "Member cluster name"),
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    request_body = crate::api::types::Manifest,
    responses(
        (status = 200, description = "Replaced object", body = crate::api::types::ObjectEnvelope),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn replace_member_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((cluster, kind, name)): Path<(String, String, String)>,
    Query(query): Query<ResourceQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    replace_in(&state, &auth.caller(&headers), &cluster, &kind, &name, query, body).await
}

#[utoipa::path(
    delete,
    path = "/api/v1/member/{cluster}/resources/{kind}/{name}",
    tag = "member",
    params(
        ("cluster" = String, Path, description = "Member cluster name"),
        ("kind" = String, Path, description = "Resource kind"),
        ("name" = String, Path, description = "Object name"),
        ResourceQuery
    ),
    responses(
        (status = 200, description = "Object deleted"),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
pub(crate) async fn delete_member_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path((cluster, kind, name)): Path<(String, String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Envelope<Option<()>>>, ApiError> {
    delete_in(&state, &auth.caller(&headers), &cluster, &kind, &name, query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, namespace: &str, created: &str) -> Value {
        json!({
            "metadata": {
                "name": name,
                "namespace": namespace,
                "creationTimestamp": created,
                "managedFields": [{"manager": "kubectl"}]
            }
        })
    }

    fn names(list: &ResourceList) -> Vec<&str> {
        list.items.iter().map(|item| metadata_str(item, "name")).collect()
    }

    fn sample() -> Vec<Value> {
        vec![
            object("web-2", "prod", "2024-03-01T00:00:00Z"),
            object("api", "prod", "2024-01-01T00:00:00Z"),
            object("web-1", "dev", "2024-02-01T00:00:00Z"),
        ]
    }

    fn query(filter: Option<&str>, sort: Option<&str>, page: Option<usize>, per: Option<usize>) -> ResourceQuery {
        ResourceQuery {
            namespace: None,
            filter_by: filter.map(str::to_string),
            sort_by: sort.map(str::to_string),
            page,
            items_per_page: per,
        }
    }

    #[test]
    fn filter_sort_then_page() {
        let shape = ListShape::parse(&query(Some("name,WEB"), Some("a,name"), Some(2), Some(1))).unwrap();
        let list = shape_list(sample(), &shape);
        assert_eq!(list.list_meta.total_items, 2);
        assert_eq!(names(&list), vec!["web-2"]);
    }

    #[test]
    fn sorts_by_creation_descending() {
        let shape = ListShape::parse(&query(None, Some("d,creationTimestamp"), None, None)).unwrap();
        let list = shape_list(sample(), &shape);
        assert_eq!(names(&list), vec!["web-2", "web-1", "api"]);
        assert_eq!(list.list_meta.total_items, 3);
    }

    #[test]
    fn filters_by_namespace() {
        let shape = ListShape::parse(&query(Some("namespace,dev"), None, None, None)).unwrap();
        assert_eq!(names(&shape_list(sample(), &shape)), vec!["web-1"]);
    }

    #[test]
    fn page_past_the_end_is_empty_but_counts() {
        let shape = ListShape::parse(&query(None, None, Some(5), Some(2))).unwrap();
        let list = shape_list(sample(), &shape);
        assert!(list.items.is_empty());
        assert_eq!(list.list_meta.total_items, 3);
    }

    #[test]
    fn malformed_queries_are_bad_requests() {
        for q in [
            query(Some("name"), None, None, None),
            query(Some("label,x"), None, None, None),
            query(None, Some("name"), None, None),
            query(None, Some("x,name"), None, None),
            query(None, Some("a,uid"), None, None),
        ] {
            let err = ListShape::parse(&q).unwrap_err();
            assert_eq!(err.body.code, 400);
        }
    }

    #[test]
    fn secrets_are_blanked_in_lists() {
        let kind = kinds::lookup("secret").unwrap();
        let mut item = json!({
            "metadata": {"name": "db", "managedFields": []},
            "data": {"password": "aHVudGVyMg==", "user": "YWRtaW4="},
            "stringData": {"token": "plain"}
        });
        redact_for_list(kind, &mut item);
        assert_eq!(item["data"], json!({"password": "", "user": ""}));
        assert!(item.get("stringData").is_none());
        assert!(item["metadata"].get("managedFields").is_none());
    }

    #[test]
    fn other_kinds_keep_data() {
        let kind = kinds::lookup("configmap").unwrap();
        let mut item = json!({"metadata": {"name": "cfg"}, "data": {"k": "v"}});
        redact_for_list(kind, &mut item);
        assert_eq!(item["data"], json!({"k": "v"}));
    }

    #[test]
    fn applications_gain_summary() {
        let mut item = json!({
            "metadata": {"name": "guestbook"},
            "status": {"sync": {"status": "Synced"}, "health": {"status": "Healthy"}}
        });
        summarize_application(&mut item);
        assert_eq!(
            item["summary"],
            json!({"syncStatus": "Synced", "healthStatus": "Healthy"})
        );

        let mut bare = json!({"metadata": {"name": "new"}});
        summarize_application(&mut bare);
        assert_eq!(bare["summary"]["syncStatus"], "Unknown");
    }

    #[test]
    fn namespace_shorthand_expands() {
        let manifest = namespace_manifest(json!({"name": "team-a", "skipAutoPropagation": true}));
        assert_eq!(manifest["kind"], "Namespace");
        assert_eq!(manifest["metadata"]["name"], "team-a");
        assert_eq!(
            manifest["metadata"]["labels"][SKIP_AUTO_PROPAGATION_LABEL],
            "true"
        );

        let plain = namespace_manifest(json!({"name": "team-b"}));
        assert!(plain["metadata"].get("labels").is_none());

        let full = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "x"}});
        assert_eq!(namespace_manifest(full.clone()), full);
    }

    #[test]
    fn decode_requires_a_name() {
        let kind = kinds::lookup("configmap").unwrap();
        let err = decode_object(kind, json!({"metadata": {}})).unwrap_err();
        assert_eq!(err.body.code, 400);

        let object = decode_object(kind, json!({"metadata": {"name": "cfg"}})).unwrap();
        let types = object.types.unwrap();
        assert_eq!(types.kind, "ConfigMap");
        assert_eq!(types.api_version, "v1");
    }

    #[test]
    fn unknown_kind_is_bad_request() {
        assert_eq!(lookup_kind("widgets").unwrap_err().body.code, 400);
    }
}
