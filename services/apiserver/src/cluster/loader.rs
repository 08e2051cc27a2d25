//! Kubernetes client configuration loading.
//!
//! Two configurations are resolved at startup:
//! - the Karmada control plane, whose credentials are also valid against the
//!   cluster-proxy subresource used to reach member clusters;
//! - the management (host) cluster, used for workloads when no member cluster
//!   is named.
//!
//! Each comes from an explicit kubeconfig file and context when configured,
//! otherwise from the ambient environment (`KUBECONFIG`, `~/.kube/config`, or
//! the in-cluster service account).
use crate::config::{DashboardConfig, KubeConfigSource};
use axum::http::Uri;
use kube::config::{KubeConfigOptions, Kubeconfig};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("read kubeconfig {path}: {source}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },
    #[error("infer kubernetes config: {0}")]
    Infer(#[from] kube::config::InferConfigError),
    #[error("invalid api server host {host}: {reason}")]
    Host { host: String, reason: String },
}

/// Loaded client configurations plus the Karmada host used for proxy URLs.
#[derive(Clone)]
pub struct ClusterConfigs {
    pub karmada: kube::Config,
    pub management: kube::Config,
    pub karmada_host: String,
}

pub async fn load_cluster_configs(config: &DashboardConfig) -> Result<ClusterConfigs, LoaderError> {
    // The Karmada context commonly lives in the management kubeconfig.
    let karmada_source = KubeConfigSource {
        kubeconfig: config
            .karmada
            .kubeconfig
            .clone()
            .or_else(|| config.management.kubeconfig.clone()),
        context: config.karmada.context.clone(),
    };
    let mut karmada = load_config(&karmada_source).await?;
    let management = load_config(&config.management).await?;

    let karmada_host = match &config.karmada_apiserver_host {
        Some(host) => {
            karmada.cluster_url = parse_host(host)?;
            host.trim_end_matches('/').to_string()
        }
        None => karmada.cluster_url.to_string().trim_end_matches('/').to_string(),
    };
    tracing::info!(
        karmada_host = %karmada_host,
        management = %management.cluster_url,
        "kubernetes client configuration loaded"
    );
    Ok(ClusterConfigs {
        karmada,
        management,
        karmada_host,
    })
}

/// Load one kubeconfig source.
pub async fn load_config(source: &KubeConfigSource) -> Result<kube::Config, LoaderError> {
    let options = KubeConfigOptions {
        context: source.context.clone(),
        ..KubeConfigOptions::default()
    };
    match &source.kubeconfig {
        Some(path) => {
            let kubeconfig =
                Kubeconfig::read_from(path).map_err(|source| LoaderError::Kubeconfig {
                    path: path.display().to_string(),
                    source,
                })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|source| LoaderError::Kubeconfig {
                    path: path.display().to_string(),
                    source,
                })
        }
        None => match kube::Config::from_kubeconfig(&options).await {
            Ok(config) => Ok(config),
            // Fall back to the in-cluster service account.
            Err(_) => Ok(kube::Config::infer().await?),
        },
    }
}

pub(crate) fn parse_host(host: &str) -> Result<Uri, LoaderError> {
    host.parse::<Uri>().map_err(|err| LoaderError::Host {
        host: host.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: host
  cluster:
    server: https://host.example:6443
    insecure-skip-tls-verify: true
- name: karmada
  cluster:
    server: https://karmada-apiserver:5443
    insecure-skip-tls-verify: true
users:
- name: admin
  user:
    token: test-token
contexts:
- name: host
  context:
    cluster: host
    user: admin
- name: karmada-apiserver
  context:
    cluster: karmada
    user: admin
current-context: host
"#;

    fn write_kubeconfig() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "dashboard-kubeconfig-{}-{}.yaml",
            std::process::id(),
            rand::random::<u32>()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn karmada_context_falls_back_to_management_file() {
        let path = write_kubeconfig();
        let mut config = DashboardConfig::local_defaults();
        config.karmada_apiserver_host = None;
        config.management = KubeConfigSource {
            kubeconfig: Some(path.clone()),
            context: Some("host".to_string()),
        };
        let loaded = load_cluster_configs(&config).await.unwrap();
        assert_eq!(loaded.karmada_host, "https://karmada-apiserver:5443");
        assert_eq!(
            loaded.management.cluster_url.to_string(),
            "https://host.example:6443/"
        );
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn host_override_replaces_cluster_url() {
        let path = write_kubeconfig();
        let mut config = DashboardConfig::local_defaults();
        config.karmada_apiserver_host = Some("https://karmada.internal:443/".to_string());
        config.management.kubeconfig = Some(path.clone());
        let loaded = load_cluster_configs(&config).await.unwrap();
        assert_eq!(loaded.karmada_host, "https://karmada.internal:443");
        assert_eq!(
            loaded.karmada.cluster_url.to_string(),
            "https://karmada.internal:443/"
        );
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_kubeconfig_file_is_reported() {
        let source = KubeConfigSource {
            kubeconfig: Some("/nonexistent/kubeconfig".into()),
            context: None,
        };
        let err = load_config(&source).await.unwrap_err();
        assert!(matches!(err, LoaderError::Kubeconfig { .. }));
    }
}
