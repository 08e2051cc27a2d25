//! Logging, tracing and metrics for the dashboard API server.
//!
//! Logs go to stdout through `tracing-subscriber`, filtered by `RUST_LOG`.
//! Spans are exported over OTLP only when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//! set; the exported resource describes the dashboard's auth and storage
//! posture so traces from differently wired replicas can be told apart.
//! Counters are recorded through the `metrics` facade where they happen
//! (authentication, the authorization gate, terminal sessions) and rendered
//! by the Prometheus recorder installed here.
use crate::config::DashboardConfig;
use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const SERVICE_NAME: &str = "karmada-dashboard";
const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

static TRACING: OnceLock<()> = OnceLock::new();
static PROPAGATOR: OnceLock<()> = OnceLock::new();
static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the subscriber and the Prometheus recorder.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_observability(config: &DashboardConfig) -> anyhow::Result<PrometheusHandle> {
    TRACING.get_or_init(|| {
        install_propagator();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let provider = otlp_provider(config);
        let otel = provider.as_ref().ok().and_then(Option::as_ref).map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
        });
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(otel)
            .try_init();
        if let Err(err) = provider {
            tracing::warn!(error = %err, "otlp exporter disabled");
        }
    });
    let handle = prometheus_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn otlp_provider(
    config: &DashboardConfig,
) -> Result<Option<SdkTracerProvider>, ExporterBuildError> {
    if std::env::var(OTLP_ENDPOINT_ENV).is_err() {
        return Ok(None);
    }
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(config))
        .build();
    Ok(Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    ))
}

fn resource_attributes(config: &DashboardConfig) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("dashboard.storage", config.storage.as_str()),
        KeyValue::new("dashboard.keycloak.enabled", config.keycloak.enabled),
        KeyValue::new("dashboard.openfga.enabled", config.openfga.is_configured()),
        KeyValue::new("dashboard.authz.fail_open", config.fail_open),
    ];
    if config.keycloak.enabled {
        attrs.push(KeyValue::new("dashboard.keycloak.issuer", config.keycloak.issuer()));
    }
    // Downward API names used by the dashboard's own Deployment.
    for (env, key) in [
        ("HOSTNAME", "service.instance.id"),
        ("POD_NAMESPACE", "k8s.namespace.name"),
        ("POD_NAME", "k8s.pod.name"),
    ] {
        if let Ok(value) = std::env::var(env) {
            attrs.push(KeyValue::new(key, value));
        }
    }
    attrs
}

fn describe_metrics() {
    metrics::describe_counter!(
        "dashboard_auth_attempts_total",
        "Bearer token authentication attempts by scheme and outcome"
    );
    metrics::describe_counter!(
        "dashboard_authz_decisions_total",
        "Member cluster authorization decisions by source and decision"
    );
    metrics::describe_counter!(
        "dashboard_terminal_sessions_total",
        "Terminal sessions closed by kind and outcome"
    );
}

fn prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = RECORDER.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("install prometheus recorder")?;
    Ok(RECORDER.get_or_init(|| handle).clone())
}

fn install_propagator() {
    PROPAGATOR.get_or_init(|| global::set_text_map_propagator(TraceContextPropagator::new()));
}

/// Parent context from W3C `traceparent`/`tracestate` request headers.
pub fn trace_context_from_headers(headers: &axum::http::HeaderMap) -> opentelemetry::Context {
    install_propagator();
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderCarrier(headers)))
}

struct HeaderCarrier<'a>(&'a axum::http::HeaderMap);

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Serve `GET /metrics` on `listener` until the task is dropped.
pub async fn serve_metrics(handle: PrometheusHandle, listener: TcpListener) -> std::io::Result<()> {
    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    );
    axum::serve(listener, app.into_make_service()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{TraceContextExt, TraceId};
    use serial_test::serial;
    use std::collections::HashMap;

    fn attributes(config: &DashboardConfig) -> HashMap<String, String> {
        resource_attributes(config)
            .into_iter()
            .map(|attr| (attr.key.as_str().to_string(), attr.value.to_string()))
            .collect()
    }

    #[test]
    fn resource_describes_local_posture() {
        let attrs = attributes(&DashboardConfig::local_defaults());
        assert_eq!(attrs["service.name"], SERVICE_NAME);
        assert_eq!(attrs["dashboard.storage"], "memory");
        assert_eq!(attrs["dashboard.keycloak.enabled"], "false");
        assert_eq!(attrs["dashboard.openfga.enabled"], "false");
        assert_eq!(attrs["dashboard.authz.fail_open"], "true");
        assert!(!attrs.contains_key("dashboard.keycloak.issuer"));
    }

    #[test]
    fn resource_describes_keycloak_and_openfga() {
        let mut config = DashboardConfig::local_defaults();
        config.storage = crate::config::StorageBackend::Etcd;
        config.keycloak.enabled = true;
        config.keycloak.url = "https://sso.example.com/".to_string();
        config.keycloak.realm = "karmada".to_string();
        config.openfga.api_url = Some("http://openfga:8080".to_string());
        config.openfga.store_id = Some("01HSTORE".to_string());
        config.fail_open = false;

        let attrs = attributes(&config);
        assert_eq!(attrs["dashboard.storage"], "etcd");
        assert_eq!(attrs["dashboard.keycloak.enabled"], "true");
        assert_eq!(
            attrs["dashboard.keycloak.issuer"],
            "https://sso.example.com/realms/karmada"
        );
        assert_eq!(attrs["dashboard.openfga.enabled"], "true");
        assert_eq!(attrs["dashboard.authz.fail_open"], "false");
    }

    #[test]
    #[serial]
    fn resource_reads_pod_identity_from_env() {
        let previous = std::env::var("POD_NAMESPACE").ok();
        unsafe {
            std::env::set_var("POD_NAMESPACE", "karmada-system");
        }
        let attrs = attributes(&DashboardConfig::local_defaults());
        match previous {
            Some(value) => unsafe { std::env::set_var("POD_NAMESPACE", value) },
            None => unsafe { std::env::remove_var("POD_NAMESPACE") },
        }
        assert_eq!(attrs["k8s.namespace.name"], "karmada-system");
    }

    #[test]
    #[serial]
    fn no_exporter_without_endpoint() {
        let previous = std::env::var(OTLP_ENDPOINT_ENV).ok();
        unsafe {
            std::env::remove_var(OTLP_ENDPOINT_ENV);
        }
        assert!(matches!(
            otlp_provider(&DashboardConfig::local_defaults()),
            Ok(None)
        ));
        if let Some(value) = previous {
            unsafe { std::env::set_var(OTLP_ENDPOINT_ENV, value) };
        }
    }

    #[test]
    fn traceparent_becomes_parent_context() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
                .parse()
                .unwrap(),
        );
        let context = trace_context_from_headers(&headers);
        let span = context.span();
        assert!(span.span_context().is_valid());
        assert_eq!(
            span.span_context().trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );

        let garbage = axum::http::HeaderMap::from_iter([(
            axum::http::header::HeaderName::from_static("traceparent"),
            axum::http::HeaderValue::from_bytes(b"\xFF").unwrap(),
        )]);
        assert!(!trace_context_from_headers(&garbage).span().span_context().is_valid());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn metrics_endpoint_renders_dashboard_counters() {
        let config = DashboardConfig::local_defaults();
        let handle = init_observability(&config).expect("observability");
        let again = init_observability(&config).expect("second init");
        metrics::counter!(
            "dashboard_auth_attempts_total",
            "scheme" => "legacy",
            "outcome" => "ok"
        )
        .increment(1);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(serve_metrics(handle, listener));

        let body = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client")
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .expect("GET /metrics")
            .error_for_status()
            .expect("metrics status")
            .text()
            .await
            .expect("body");
        assert!(body.contains("dashboard_auth_attempts_total"));
        assert!(again.render().contains("dashboard_auth_attempts_total"));
        server.abort();
    }
}
