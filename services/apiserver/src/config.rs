use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_KARMADA_CONTEXT: &str = "karmada-apiserver";
pub const DEFAULT_OPENFGA_RELATION: &str = "can_access";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_ETCD_PREFIX: &str = "karmada-dashboard/";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_NODE_SHELL_IMAGE: &str = "busybox:1.36";
pub const DEFAULT_NODE_SHELL_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Etcd,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "etcd" => Ok(Self::Etcd),
            other => bail!("unknown storage backend: {other}"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Etcd => "etcd",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KubeConfigSource {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub enabled: bool,
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub admin_roles: Vec<String>,
    pub audience: Option<String>,
}

impl KeycloakConfig {
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.url.trim_end_matches('/'), self.realm)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }
}

#[derive(Debug, Clone)]
pub struct OpenFgaConfig {
    pub api_url: Option<String>,
    pub store_id: Option<String>,
    pub authorization_model_id: Option<String>,
    pub relation: String,
}

impl OpenFgaConfig {
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.store_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NodeShellConfig {
    pub image: String,
    pub namespace: String,
    pub timeout: Duration,
}

// Dashboard configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub management: KubeConfigSource,
    pub karmada: KubeConfigSource,
    pub karmada_apiserver_host: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub admin_password: String,
    /// Service-account subjects (`system:serviceaccount:<ns>:<name>`) granted
    /// `admin` on token login. Every other service account is a basic user.
    pub admin_service_accounts: Vec<String>,
    pub storage: StorageBackend,
    pub etcd_endpoints: Vec<String>,
    pub etcd_prefix: String,
    pub frontend_url: String,
    pub keycloak: KeycloakConfig,
    pub openfga: OpenFgaConfig,
    pub fail_open: bool,
    pub node_shell: NodeShellConfig,
}

#[derive(Debug, Default, Deserialize)]
struct KeycloakOverride {
    enabled: Option<bool>,
    url: Option<String>,
    realm: Option<String>,
    client_id: Option<String>,
    admin_roles: Option<Vec<String>>,
    audience: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFgaOverride {
    api_url: Option<String>,
    store_id: Option<String>,
    authorization_model_id: Option<String>,
    relation: Option<String>,
    fail_open: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeShellOverride {
    image: Option<String>,
    namespace: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DashboardConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    kubeconfig: Option<String>,
    kube_context: Option<String>,
    karmada_kubeconfig: Option<String>,
    karmada_context: Option<String>,
    karmada_apiserver_host: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_secs: Option<u64>,
    admin_password: Option<String>,
    admin_service_accounts: Option<Vec<String>>,
    storage: Option<String>,
    etcd_endpoints: Option<Vec<String>>,
    etcd_prefix: Option<String>,
    frontend_url: Option<String>,
    keycloak: Option<KeycloakOverride>,
    openfga: Option<OpenFgaOverride>,
    node_shell: Option<NodeShellOverride>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env_opt(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("parse {key}: expected a boolean, got {other}"),
        },
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("DASHBOARD_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .with_context(|| "parse DASHBOARD_BIND")?;
        let metrics_bind = std::env::var("DASHBOARD_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse DASHBOARD_METRICS_BIND")?;
        let token_ttl = env_opt("DASHBOARD_TOKEN_TTL_SECS")
            .map(|value| value.parse::<u64>())
            .transpose()
            .with_context(|| "parse DASHBOARD_TOKEN_TTL_SECS")?
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let storage = StorageBackend::parse(
            &std::env::var("DASHBOARD_STORAGE").unwrap_or_else(|_| "memory".to_string()),
        )
        .with_context(|| "parse DASHBOARD_STORAGE")?;
        let admin_roles = env_opt("KEYCLOAK_ADMIN_ROLES")
            .map(|value| split_list(&value))
            .unwrap_or_else(dashboard_authz::default_admin_roles);
        let node_shell_timeout = env_opt("DASHBOARD_NODE_SHELL_TIMEOUT_SECS")
            .map(|value| value.parse::<u64>())
            .transpose()
            .with_context(|| "parse DASHBOARD_NODE_SHELL_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_NODE_SHELL_TIMEOUT_SECS);

        Ok(Self {
            bind_addr,
            metrics_bind,
            management: KubeConfigSource {
                kubeconfig: env_opt("KUBECONFIG").map(PathBuf::from),
                context: env_opt("DASHBOARD_KUBE_CONTEXT"),
            },
            karmada: KubeConfigSource {
                kubeconfig: env_opt("KARMADA_KUBECONFIG").map(PathBuf::from),
                context: Some(
                    env_opt("KARMADA_CONTEXT")
                        .unwrap_or_else(|| DEFAULT_KARMADA_CONTEXT.to_string()),
                ),
            },
            karmada_apiserver_host: env_opt("KARMADA_APISERVER_HOST"),
            jwt_secret: env_opt("DASHBOARD_JWT_SECRET"),
            token_ttl: Duration::from_secs(token_ttl),
            admin_password: env_opt("DASHBOARD_ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            admin_service_accounts: env_opt("DASHBOARD_ADMIN_SERVICE_ACCOUNTS")
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            storage,
            etcd_endpoints: env_opt("ETCD_ENDPOINTS")
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            etcd_prefix: env_opt("ETCD_PREFIX")
                .unwrap_or_else(|| DEFAULT_ETCD_PREFIX.to_string()),
            frontend_url: env_opt("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            keycloak: KeycloakConfig {
                enabled: env_bool("KEYCLOAK_ENABLED", false)?,
                url: env_opt("KEYCLOAK_URL").unwrap_or_default(),
                realm: env_opt("KEYCLOAK_REALM").unwrap_or_default(),
                client_id: env_opt("KEYCLOAK_CLIENT_ID").unwrap_or_default(),
                admin_roles,
                audience: env_opt("KEYCLOAK_AUDIENCE"),
            },
            openfga: OpenFgaConfig {
                api_url: env_opt("OPENFGA_API_URL"),
                store_id: env_opt("OPENFGA_STORE_ID"),
                authorization_model_id: env_opt("OPENFGA_AUTHORIZATION_MODEL_ID"),
                relation: env_opt("OPENFGA_RELATION")
                    .unwrap_or_else(|| DEFAULT_OPENFGA_RELATION.to_string()),
            },
            fail_open: env_bool("DASHBOARD_AUTHZ_FAIL_OPEN", true)?,
            node_shell: NodeShellConfig {
                image: env_opt("DASHBOARD_NODE_SHELL_IMAGE")
                    .unwrap_or_else(|| DEFAULT_NODE_SHELL_IMAGE.to_string()),
                namespace: env_opt("DASHBOARD_NODE_SHELL_NAMESPACE")
                    .unwrap_or_else(|| "default".to_string()),
                timeout: Duration::from_secs(node_shell_timeout),
            },
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("DASHBOARD_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read DASHBOARD_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: DashboardConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse dashboard config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.kubeconfig {
            self.management.kubeconfig = Some(PathBuf::from(value));
        }
        if let Some(value) = override_cfg.kube_context {
            self.management.context = Some(value);
        }
        if let Some(value) = override_cfg.karmada_kubeconfig {
            self.karmada.kubeconfig = Some(PathBuf::from(value));
        }
        if let Some(value) = override_cfg.karmada_context {
            self.karmada.context = Some(value);
        }
        if let Some(value) = override_cfg.karmada_apiserver_host {
            self.karmada_apiserver_host = Some(value);
        }
        if let Some(value) = override_cfg.jwt_secret {
            self.jwt_secret = Some(value);
        }
        if let Some(value) = override_cfg.token_ttl_secs {
            self.token_ttl = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.admin_password {
            self.admin_password = value;
        }
        if let Some(value) = override_cfg.admin_service_accounts {
            self.admin_service_accounts = value;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = StorageBackend::parse(&value).with_context(|| "parse storage")?;
        }
        if let Some(value) = override_cfg.etcd_endpoints {
            self.etcd_endpoints = value;
        }
        if let Some(value) = override_cfg.etcd_prefix {
            self.etcd_prefix = value;
        }
        if let Some(value) = override_cfg.frontend_url {
            self.frontend_url = value;
        }
        if let Some(kc) = override_cfg.keycloak {
            if let Some(value) = kc.enabled {
                self.keycloak.enabled = value;
            }
            if let Some(value) = kc.url {
                self.keycloak.url = value;
            }
            if let Some(value) = kc.realm {
                self.keycloak.realm = value;
            }
            if let Some(value) = kc.client_id {
                self.keycloak.client_id = value;
            }
            if let Some(value) = kc.admin_roles {
                self.keycloak.admin_roles = value;
            }
            if let Some(value) = kc.audience {
                self.keycloak.audience = Some(value);
            }
        }
        if let Some(fga) = override_cfg.openfga {
            if let Some(value) = fga.api_url {
                self.openfga.api_url = Some(value);
            }
            if let Some(value) = fga.store_id {
                self.openfga.store_id = Some(value);
            }
            if let Some(value) = fga.authorization_model_id {
                self.openfga.authorization_model_id = Some(value);
            }
            if let Some(value) = fga.relation {
                self.openfga.relation = value;
            }
            if let Some(value) = fga.fail_open {
                self.fail_open = value;
            }
        }
        if let Some(shell) = override_cfg.node_shell {
            if let Some(value) = shell.image {
                self.node_shell.image = value;
            }
            if let Some(value) = shell.namespace {
                self.node_shell.namespace = value;
            }
            if let Some(value) = shell.timeout_secs {
                self.node_shell.timeout = Duration::from_secs(value);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.keycloak.enabled
            && (self.keycloak.url.is_empty()
                || self.keycloak.realm.is_empty()
                || self.keycloak.client_id.is_empty())
        {
            bail!("keycloak is enabled but KEYCLOAK_URL, KEYCLOAK_REALM or KEYCLOAK_CLIENT_ID is missing");
        }
        if self.storage == StorageBackend::Etcd && self.etcd_endpoints.is_empty() {
            bail!("etcd storage selected but ETCD_ENDPOINTS is empty");
        }
        Ok(())
    }

    pub fn is_admin_service_account(&self, subject: &str) -> bool {
        self.admin_service_accounts.iter().any(|entry| entry == subject)
    }

    /// Redirect target the frontend registers with Keycloak after login.
    pub fn keycloak_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.frontend_url.trim_end_matches('/'))
    }

    pub fn keycloak_logout_redirect_uri(&self) -> String {
        format!("{}/login", self.frontend_url.trim_end_matches('/'))
    }

    /// Baseline configuration for tests and local runs without a cluster.
    pub fn local_defaults() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            metrics_bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            management: KubeConfigSource::default(),
            karmada: KubeConfigSource {
                kubeconfig: None,
                context: Some(DEFAULT_KARMADA_CONTEXT.to_string()),
            },
            karmada_apiserver_host: Some("https://karmada-apiserver:5443".to_string()),
            jwt_secret: Some("local-secret".to_string()),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            admin_service_accounts: Vec::new(),
            storage: StorageBackend::Memory,
            etcd_endpoints: Vec::new(),
            etcd_prefix: DEFAULT_ETCD_PREFIX.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            keycloak: KeycloakConfig {
                enabled: false,
                url: String::new(),
                realm: String::new(),
                client_id: String::new(),
                admin_roles: dashboard_authz::default_admin_roles(),
                audience: None,
            },
            openfga: OpenFgaConfig {
                api_url: None,
                store_id: None,
                authorization_model_id: None,
                relation: DEFAULT_OPENFGA_RELATION.to_string(),
            },
            fail_open: true,
            node_shell: NodeShellConfig {
                image: DEFAULT_NODE_SHELL_IMAGE.to_string(),
                namespace: "default".to_string(),
                timeout: Duration::from_secs(DEFAULT_NODE_SHELL_TIMEOUT_SECS),
            },
        }
    }
}
