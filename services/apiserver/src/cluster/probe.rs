//! Live validation of Karmada service-account tokens.
//!
//! A token is considered usable when the Karmada API server accepts it on its
//! discovery endpoint (`GET /api`). Nothing about the token's validity is
//! cached; every check is a fresh request.
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("control plane unreachable: {0}")]
    Unreachable(String),
    #[error("token rejected by control plane with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait ControlPlaneProbe: Send + Sync {
    async fn probe(&self, token: &str) -> Result<(), ProbeError>;
}

/// Probe hitting Karmada's discovery endpoint with the token as bearer.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe {
    client: reqwest::Client,
    discovery_url: String,
}

impl DiscoveryProbe {
    /// Trust roots and TLS verification follow the Karmada client config.
    pub fn from_config(config: &kube::Config, karmada_host: &str) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(5));
        if let Some(roots) = &config.root_cert {
            for der in roots {
                let cert = reqwest::Certificate::from_der(der)
                    .map_err(|err| ProbeError::Unreachable(format!("invalid root cert: {err}")))?;
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| ProbeError::Unreachable(err.to_string()))?;
        Ok(Self::with_client(client, karmada_host))
    }

    pub fn with_client(client: reqwest::Client, karmada_host: &str) -> Self {
        Self {
            client,
            discovery_url: format!("{}/api", karmada_host.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ControlPlaneProbe for DiscoveryProbe {
    async fn probe(&self, token: &str) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ProbeError::Unreachable(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            tracing::debug!(%status, "control plane rejected service-account token");
            Err(ProbeError::Rejected(status.as_u16()))
        }
    }
}
