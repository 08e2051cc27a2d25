//! WebSocket terminal endpoints.
//!
//! Both handlers authorize and build the target client before upgrading, so a
//! denied or misaddressed request gets an ordinary JSON error instead of a
//! socket that closes immediately.
use crate::api::error::{ApiError, api_bad_request};
use crate::app::AppState;
use crate::auth::middleware::AuthContext;
use crate::terminal::node_shell::run_node_session;
use crate::terminal::{ExecTarget, Session, SessionKind, run_pod_session};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;
use utoipa::IntoParams;

const SHELLS: [&str; 6] = ["sh", "bash", "ash", "zsh", "powershell", "cmd"];

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PodTerminalQuery {
    /// Member cluster; empty means the management cluster.
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub container: Option<String>,
    /// One of `sh`, `bash`, `ash`, `zsh`, `powershell`, `cmd`. Defaults to `sh`.
    pub shell: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NodeTerminalQuery {
    pub cluster: Option<String>,
    pub node: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn exec_target(query: PodTerminalQuery) -> Result<ExecTarget, ApiError> {
    let pod = non_empty(query.pod).ok_or_else(|| api_bad_request("pod is required"))?;
    let shell = non_empty(query.shell).unwrap_or_else(|| "sh".to_string());
    if !SHELLS.contains(&shell.as_str()) {
        return Err(api_bad_request(format!("unsupported shell {shell}")));
    }
    Ok(ExecTarget {
        namespace: non_empty(query.namespace).unwrap_or_else(|| "default".to_string()),
        pod,
        container: non_empty(query.container),
        command: vec![shell],
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/terminal",
    tag = "terminal",
    params(PodTerminalQuery),
    responses(
        (status = 101, description = "Switching to the terminal WebSocket"),
        (status = 400, description = "Missing pod or unsupported shell", body = crate::api::types::ErrorEnvelope),
        (status = 403, description = "Caller may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Open an interactive shell in a pod.
///
/// # What it does
/// Validates the target, authorizes the cluster, then upgrades and bridges
/// the socket to `exec` with a TTY.
///
/// # Errors
/// - 400 for a missing pod or an unsupported shell.
/// - 401/403/502 from authentication and the authorization gate.
pub(crate) async fn pod_terminal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Query(query): Query<PodTerminalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let cluster = query.cluster.clone().unwrap_or_default();
    let target = exec_target(query)?;
    let client = state
        .router
        .workload_client_for(&auth.caller(&headers), &cluster)
        .await?;
    tracing::info!(
        user = %auth.identity.username,
        cluster = %cluster,
        namespace = %target.namespace,
        pod = %target.pod,
        "terminal requested"
    );
    Ok(ws.on_upgrade(move |socket| {
        run_pod_session(client, target, socket, Session::new(SessionKind::Pod))
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/node-terminal",
    tag = "terminal",
    params(NodeTerminalQuery),
    responses(
        (status = 101, description = "Switching to the node shell WebSocket"),
        (status = 400, description = "Missing node", body = crate::api::types::ErrorEnvelope),
        (status = 403, description = "Caller is not an administrator or may not access the cluster", body = crate::api::types::ErrorEnvelope)
    )
)]
/// Open a shell on a node through a privileged helper pod.
///
/// # What it does
/// After the upgrade, creates the helper on the node, waits for it within the
/// configured timeout, enters the host namespaces, and deletes the helper
/// when the session ends.
///
/// # Errors
/// - 400 for a missing node.
/// - 403 for callers without the `admin` role, before any upgrade.
/// - 401/403/502 from authentication and the authorization gate.
pub(crate) async fn node_terminal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Query(query): Query<NodeTerminalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let node = non_empty(query.node).ok_or_else(|| api_bad_request("node is required"))?;
    let cluster = query.cluster.unwrap_or_default();
    let client = state
        .router
        .workload_client_for(&auth.caller(&headers), &cluster)
        .await?;
    tracing::info!(user = %auth.identity.username, cluster = %cluster, node = %node, "node shell requested");
    let config = state.config.node_shell.clone();
    Ok(ws.on_upgrade(move |socket| {
        run_node_session(client, node, config, socket, Session::new(SessionKind::Node))
    }))
}
