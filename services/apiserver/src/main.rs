//! Karmada dashboard API server entry point.
//!
//! # Purpose
//! Loads configuration, opens the dashboard store, resolves the Karmada and
//! management cluster configs, then serves the HTTP API and metrics endpoint.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use apiserver::app::{AppState, build_router, seed_admin};
use apiserver::cluster::loader::load_cluster_configs;
use apiserver::cluster::probe::DiscoveryProbe;
use apiserver::config::{self, DashboardConfig};
use apiserver::observability;
use apiserver::store::{DashboardStore, etcd::EtcdStore, memory::InMemoryStore};
use rand::RngCore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DashboardConfig::from_env_or_yaml().context("load dashboard config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: DashboardConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability(&config)?;
    let metrics_listener = tokio::net::TcpListener::bind(config.metrics_bind)
        .await
        .with_context(|| format!("bind metrics listener {}", config.metrics_bind))?;
    let addr = config.bind_addr;
    let state = build_state(config).await?;
    tracing::info!(
        storage = state.store.backend_name(),
        durable = state.store.is_durable(),
        "dashboard store ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(metrics_handle, metrics_listener));

    let app = build_router(state);

    tracing::info!(%addr, "dashboard api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn build_state(mut config: DashboardConfig) -> anyhow::Result<AppState> {
    if config.jwt_secret.is_none() {
        tracing::warn!("no JWT secret configured; generated one for this process only");
        config.jwt_secret = Some(random_secret());
    }

    let store: Arc<dyn DashboardStore> = match config.storage {
        config::StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        config::StorageBackend::Etcd => {
            if config.etcd_endpoints.is_empty() {
                anyhow::bail!("etcd endpoints missing");
            }
            Arc::new(
                EtcdStore::connect(&config.etcd_endpoints, &config.etcd_prefix)
                    .await
                    .context("connect etcd store")?,
            )
        }
    };
    seed_admin(store.as_ref(), &config.admin_password)
        .await
        .context("seed admin user")?;

    let configs = load_cluster_configs(&config)
        .await
        .context("load cluster configs")?;
    let probe = DiscoveryProbe::from_config(&configs.karmada, &configs.karmada_host)
        .context("build control plane probe")?;

    AppState::new(config, store, configs, Arc::new(probe))
}
