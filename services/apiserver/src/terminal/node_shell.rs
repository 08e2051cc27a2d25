//! Node-level shells through privileged helper pods.
//!
//! A helper pod is pinned to the target node with host PID, network and IPC
//! namespaces, then `nsenter` into PID 1 gives a shell on the node itself.
//! The helper is deleted when the session ends on every exit path: explicitly
//! through [`HelperPod::cleanup`], or from `Drop` if the session task unwinds
//! or is cancelled before reaching it.
use crate::config::NodeShellConfig;
use crate::terminal::{
    ExecTarget, Session, SessionState, TerminalError, run_exec_session, send_error,
};
use axum::extract::ws::Message;
use futures::{Sink, Stream};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, SecurityContext, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;

pub const HELPER_LABEL: &str = "dashboard.karmada.io/node-shell";

/// Command exec'd inside the helper to enter the node's namespaces.
pub fn nsenter_command() -> Vec<String> {
    ["nsenter", "-t", "1", "-m", "-u", "-i", "-n", "-p", "--", "sh"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn helper_pod_name(node: &str) -> String {
    let node: String = node
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .take(40)
        .collect();
    let suffix: u32 = rand::thread_rng().gen_range(0..0x10_0000);
    format!("node-shell-{}-{suffix:05x}", node.trim_matches('-'))
}

/// Build the privileged helper pod spec for `node`.
pub fn helper_pod(name: &str, node: &str, image: &str) -> Pod {
    let labels = BTreeMap::from([(HELPER_LABEL.to_string(), node.to_string())]);
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            host_pid: Some(true),
            host_network: Some(true),
            host_ipc: Some(true),
            restart_policy: Some("Never".to_string()),
            termination_grace_period_seconds: Some(0),
            tolerations: Some(vec![Toleration {
                operator: Some("Exists".to_string()),
                ..Toleration::default()
            }]),
            containers: vec![Container {
                name: "shell".to_string(),
                image: Some(image.to_string()),
                command: Some(vec!["sleep".to_string(), "infinity".to_string()]),
                stdin: Some(true),
                tty: Some(true),
                security_context: Some(SecurityContext {
                    privileged: Some(true),
                    ..SecurityContext::default()
                }),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

/// Phase of a helper pod as far as the shell is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

pub fn pod_readiness(pod: &Pod) -> Readiness {
    let Some(status) = &pod.status else {
        return Readiness::Pending;
    };
    match status.phase.as_deref() {
        Some("Failed") | Some("Succeeded") => {
            let reason = status
                .reason
                .clone()
                .or_else(|| status.message.clone())
                .unwrap_or_else(|| "helper pod terminated".to_string());
            Readiness::Failed(reason)
        }
        Some("Running") => {
            let ready = status
                .container_statuses
                .as_ref()
                .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|s| s.ready));
            if ready { Readiness::Ready } else { Readiness::Pending }
        }
        _ => Readiness::Pending,
    }
}

/// A created helper pod. Deleted on [`HelperPod::cleanup`] or drop.
pub struct HelperPod {
    api: Api<Pod>,
    name: String,
    deleted: bool,
}

impl HelperPod {
    pub async fn create(
        api: Api<Pod>,
        node: &str,
        image: &str,
    ) -> Result<Self, TerminalError> {
        let name = helper_pod_name(node);
        api.create(&PostParams::default(), &helper_pod(&name, node, image))
            .await?;
        tracing::info!(pod = %name, node, "node shell helper pod created");
        Ok(Self {
            api,
            name,
            deleted: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll until the helper reports a running, ready container.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), TerminalError> {
        match tokio::time::timeout(timeout, self.poll_ready()).await {
            Ok(result) => result,
            Err(_) => Err(TerminalError::NodeShellTimeout {
                pod: self.name.clone(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn poll_ready(&self) -> Result<(), TerminalError> {
        loop {
            let pod = self.api.get(&self.name).await?;
            match pod_readiness(&pod) {
                Readiness::Ready => return Ok(()),
                Readiness::Failed(reason) => {
                    return Err(TerminalError::NodeShellFailed {
                        pod: self.name.clone(),
                        reason,
                    });
                }
                Readiness::Pending => tokio::time::sleep(Duration::from_secs(1)).await,
            }
        }
    }

    pub async fn cleanup(mut self) {
        self.deleted = true;
        delete_helper(&self.api, &self.name).await;
    }
}

impl Drop for HelperPod {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }
        let api = self.api.clone();
        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { delete_helper(&api, &name).await });
            }
            Err(_) => tracing::error!(pod = %name, "no runtime to delete node shell helper pod"),
        }
    }
}

async fn delete_helper(api: &Api<Pod>, name: &str) {
    let params = DeleteParams {
        grace_period_seconds: Some(0),
        ..DeleteParams::default()
    };
    match api.delete(name, &params).await {
        Ok(_) => tracing::info!(pod = %name, "node shell helper pod deleted"),
        Err(kube::Error::Api(response)) if response.code == 404 => {}
        Err(err) => tracing::warn!(pod = %name, error = %err, "failed to delete node shell helper pod"),
    }
}

/// Drive a node shell: create the helper, wait for it, exec `nsenter`, and
/// delete the helper again whatever the outcome.
pub async fn run_node_session<S>(
    client: kube::Client,
    node: String,
    config: NodeShellConfig,
    mut socket: S,
    mut session: Session,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    if let Err(err) = session.transition(SessionState::Upgraded) {
        tracing::warn!(error = %err, "node shell session not upgradable");
        session.close("invalid_state");
        return;
    }
    let api: Api<Pod> = Api::namespaced(client.clone(), &config.namespace);
    let helper = match HelperPod::create(api, &node, &config.image).await {
        Ok(helper) => helper,
        Err(err) => {
            tracing::warn!(node = %node, error = %err, "node shell helper creation failed");
            send_error(&mut socket, &err).await;
            session.close("helper_failed");
            return;
        }
    };
    let outcome = match helper.wait_ready(config.timeout).await {
        Ok(()) => {
            let target = ExecTarget {
                namespace: config.namespace.clone(),
                pod: helper.name().to_string(),
                container: Some("shell".to_string()),
                command: nsenter_command(),
            };
            match run_exec_session(client, target, socket, &mut session).await {
                Ok(end) => end.as_str(),
                Err(err) => {
                    tracing::warn!(node = %node, error = %err, "node shell exec failed");
                    "exec_failed"
                }
            }
        }
        Err(err) => {
            tracing::warn!(node = %node, error = %err, "node shell helper never became ready");
            send_error(&mut socket, &err).await;
            "helper_failed"
        }
    };
    helper.cleanup().await;
    session.close(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};

    fn with_status(phase: &str, ready: &[bool]) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(
                    ready
                        .iter()
                        .map(|ready| ContainerStatus {
                            name: "shell".to_string(),
                            ready: *ready,
                            ..ContainerStatus::default()
                        })
                        .collect(),
                ),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    #[test]
    fn helper_is_privileged_and_pinned() {
        let pod = helper_pod("node-shell-worker-1-abcde", "worker-1", "busybox:1.36");
        let spec = pod.spec.unwrap();
        assert_eq!(spec.node_name.as_deref(), Some("worker-1"));
        assert_eq!(spec.host_pid, Some(true));
        let container = &spec.containers[0];
        assert_eq!(container.image.as_deref(), Some("busybox:1.36"));
        assert_eq!(
            container.security_context.as_ref().unwrap().privileged,
            Some(true)
        );
        assert_eq!(
            pod.metadata.labels.unwrap().get(HELPER_LABEL).map(String::as_str),
            Some("worker-1")
        );
    }

    #[test]
    fn names_are_dns_safe_with_hex_suffix() {
        let name = helper_pod_name("Worker_1.example");
        let suffix = name
            .strip_prefix("node-shell-worker-1-example-")
            .expect("sanitized node in name");
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));

        let long = helper_pod_name(&"n".repeat(200));
        assert!(long.len() <= 63, "{}", long.len());
    }

    #[test]
    fn readiness_requires_running_and_ready_containers() {
        assert_eq!(pod_readiness(&Pod::default()), Readiness::Pending);
        assert_eq!(pod_readiness(&with_status("Pending", &[false])), Readiness::Pending);
        assert_eq!(pod_readiness(&with_status("Running", &[false])), Readiness::Pending);
        assert_eq!(pod_readiness(&with_status("Running", &[])), Readiness::Pending);
        assert_eq!(pod_readiness(&with_status("Running", &[true])), Readiness::Ready);
        assert!(matches!(
            pod_readiness(&with_status("Failed", &[false])),
            Readiness::Failed(_)
        ));
    }

    #[test]
    fn nsenter_enters_pid_one() {
        assert_eq!(
            nsenter_command().join(" "),
            "nsenter -t 1 -m -u -i -n -p -- sh"
        );
    }
}
