//! etcd-backed implementation of the dashboard store.
//!
//! # What this module is
//! A durable store that talks to etcd through its v3 JSON gateway
//! (`/v3/kv/range`, `/v3/kv/put`, `/v3/kv/deleterange`, `/v3/kv/txn`) using
//! `reqwest`. Keys and values travel base64-encoded, as the gateway requires.
//!
//! # Key layout
//! - `{prefix}service-account-token` holds the Karmada token string; with the
//!   default prefix that is `karmada-dashboard/service-account-token`.
//! - `{prefix}users/<name>` holds a JSON [`UserRecord`].
//! - `{prefix}user-settings/<name>` holds JSON [`UserSettings`].
//!
//! # Consistency
//! - Token writes fully replace the value, so concurrent writers cannot
//!   interleave a read-modify-write.
//! - User creation is a single transaction guarded on `create_revision == 0`,
//!   which makes "already exists" detection atomic across replicas.
//!
//! # Security model
//! - Endpoint URLs may embed credentials; they are never logged.
//! - Token values are never logged.
use super::{
    DashboardStore, SERVICE_ACCOUNT_TOKEN_NAME, ServiceAccountTokenStore, StoreError, StoreResult,
    UserStore,
};
use crate::model::{UserRecord, UserSettings};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EtcdStore {
    client: reqwest::Client,
    endpoints: Vec<String>,
    prefix: String,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct DeleteRangeResponse {
    // int64 fields are rendered as strings by the gateway.
    #[serde(default)]
    deleted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxnResponse {
    #[serde(default)]
    succeeded: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    health: String,
}

impl EtcdStore {
    pub async fn connect(endpoints: &[String], prefix: &str) -> StoreResult<Self> {
        if endpoints.is_empty() {
            return Err(StoreError::Unexpected(anyhow!("no etcd endpoints configured")));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("build etcd http client")?;
        let store = Self {
            client,
            endpoints: endpoints
                .iter()
                .map(|endpoint| endpoint.trim_end_matches('/').to_string())
                .collect(),
            prefix: normalize_prefix(prefix),
        };
        store.health_check().await?;
        tracing::info!(endpoints = store.endpoints.len(), "connected to etcd");
        Ok(store)
    }

    fn token_key(&self) -> String {
        format!("{}{SERVICE_ACCOUNT_TOKEN_NAME}", self.prefix)
    }

    fn user_key(&self, username: &str) -> String {
        format!("{}users/{username}", self.prefix)
    }

    fn settings_key(&self, username: &str) -> String {
        format!("{}user-settings/{username}", self.prefix)
    }

    /// POST to the first endpoint that answers; transport failures move on to
    /// the next endpoint, HTTP errors do not.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> StoreResult<T> {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let url = format!("{endpoint}{path}");
            match self.client.post(&url).json(&body).send().await {
                Ok(response) => {
                    let response = response
                        .error_for_status()
                        .with_context(|| format!("etcd {path}"))?;
                    let parsed = response
                        .json::<T>()
                        .await
                        .with_context(|| format!("decode etcd {path} response"))?;
                    return Ok(parsed);
                }
                Err(err) => {
                    tracing::warn!(error = %err, path, "etcd endpoint unreachable");
                    last_err = Some(err);
                }
            }
        }
        Err(StoreError::Unexpected(match last_err {
            Some(err) => anyhow!(err).context(format!("etcd {path}")),
            None => anyhow!("etcd {path}: no endpoints"),
        }))
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let response: RangeResponse = self
            .call("/v3/kv/range", json!({ "key": STANDARD.encode(key) }))
            .await?;
        match response.kvs.into_iter().next() {
            Some(kv) => Ok(Some(decode_b64(&kv.value)?)),
            None => Ok(None),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).with_context(|| format!("decode {key}"))?,
            )),
            None => Ok(None),
        }
    }

    async fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let _: serde_json::Value = self
            .call(
                "/v3/kv/put",
                json!({ "key": STANDARD.encode(key), "value": STANDARD.encode(value) }),
            )
            .await?;
        Ok(())
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).with_context(|| format!("encode {key}"))?;
        self.put_raw(key, &bytes).await
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let response: DeleteRangeResponse = self
            .call("/v3/kv/deleterange", json!({ "key": STANDARD.encode(key) }))
            .await?;
        Ok(response
            .deleted
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }

    async fn list_prefix<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let response: RangeResponse = self
            .call(
                "/v3/kv/range",
                json!({
                    "key": STANDARD.encode(prefix),
                    "range_end": STANDARD.encode(prefix_range_end(prefix.as_bytes())),
                }),
            )
            .await?;
        let mut items = Vec::with_capacity(response.kvs.len());
        for kv in response.kvs {
            let bytes = decode_b64(&kv.value)?;
            let item = serde_json::from_slice(&bytes)
                .with_context(|| format!("decode entry {}", kv.key))?;
            items.push(item);
        }
        Ok(items)
    }
}

#[async_trait]
impl ServiceAccountTokenStore for EtcdStore {
    async fn service_account_token(&self) -> StoreResult<Option<String>> {
        match self.get_raw(&self.token_key()).await? {
            Some(bytes) => {
                let token = String::from_utf8(bytes).context("service account token is not utf-8")?;
                Ok(Some(token).filter(|token| !token.is_empty()))
            }
            None => Ok(None),
        }
    }

    async fn put_service_account_token(&self, token: &str) -> StoreResult<()> {
        self.put_raw(&self.token_key(), token.as_bytes()).await
    }

    async fn clear_service_account_token(&self) -> StoreResult<()> {
        self.delete(&self.token_key()).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for EtcdStore {
    async fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        self.get_json(&self.user_key(username)).await
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.list_prefix(&self.user_key("")).await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn create_user(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let key = STANDARD.encode(self.user_key(&user.username));
        let value = serde_json::to_vec(&user).context("encode user")?;
        let response: TxnResponse = self
            .call(
                "/v3/kv/txn",
                json!({
                    "compare": [{
                        "key": key,
                        "target": "CREATE",
                        "result": "EQUAL",
                        "create_revision": "0"
                    }],
                    "success": [{
                        "request_put": { "key": key, "value": STANDARD.encode(value) }
                    }]
                }),
            )
            .await?;
        if !response.succeeded {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        Ok(user)
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        let deleted = self.delete(&self.user_key(username)).await?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("user {username}")));
        }
        self.delete(&self.settings_key(username)).await?;
        Ok(())
    }

    async fn user_settings(&self, username: &str) -> StoreResult<Option<UserSettings>> {
        self.get_json(&self.settings_key(username)).await
    }

    async fn put_user_settings(&self, settings: UserSettings) -> StoreResult<UserSettings> {
        self.put_json(&self.settings_key(&settings.username), &settings)
            .await?;
        Ok(settings)
    }
}

#[async_trait]
impl DashboardStore for EtcdStore {
    async fn health_check(&self) -> StoreResult<()> {
        let mut last_err = anyhow!("no etcd endpoints");
        for endpoint in &self.endpoints {
            let result = async {
                let response: HealthResponse = self
                    .client
                    .get(format!("{endpoint}/health"))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok::<_, reqwest::Error>(response)
            }
            .await;
            match result {
                Ok(response) if response.health == "true" => return Ok(()),
                Ok(response) => last_err = anyhow!("etcd reports health={}", response.health),
                Err(err) => last_err = anyhow!(err),
            }
        }
        Err(StoreError::Unexpected(last_err.context("etcd health check")))
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "etcd"
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

fn decode_b64(value: &str) -> StoreResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|err| StoreError::Unexpected(anyhow!("invalid base64 from etcd: {err}")))
}

/// Smallest key greater than every key starting with `prefix`.
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xff (or empty): range to the end of the keyspace.
    vec![0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::routing::{get, post};
    use dashboard_authz::Role;
    use std::collections::BTreeMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    type Kv = Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>;

    fn b64(value: &serde_json::Value) -> Vec<u8> {
        STANDARD.decode(value.as_str().unwrap_or_default()).unwrap()
    }

    async fn range(State(kv): State<Kv>, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let key = b64(&body["key"]);
        let kv = kv.lock().unwrap();
        let kvs: Vec<serde_json::Value> = match body.get("range_end") {
            Some(end) => {
                let end = b64(end);
                kv.range(key..end)
                    .map(|(k, v)| json!({ "key": STANDARD.encode(k), "value": STANDARD.encode(v) }))
                    .collect()
            }
            None => kv
                .get(&key)
                .map(|v| vec![json!({ "key": STANDARD.encode(&key), "value": STANDARD.encode(v) })])
                .unwrap_or_default(),
        };
        if kvs.is_empty() {
            Json(json!({ "header": {} }))
        } else {
            Json(json!({ "header": {}, "kvs": kvs, "count": kvs.len().to_string() }))
        }
    }

    async fn put(State(kv): State<Kv>, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        kv.lock()
            .unwrap()
            .insert(b64(&body["key"]), b64(&body["value"]));
        Json(json!({ "header": {} }))
    }

    async fn delete_range(
        State(kv): State<Kv>,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        let removed = kv.lock().unwrap().remove(&b64(&body["key"]));
        match removed {
            Some(_) => Json(json!({ "header": {}, "deleted": "1" })),
            None => Json(json!({ "header": {} })),
        }
    }

    async fn txn(State(kv): State<Kv>, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let key = b64(&body["compare"][0]["key"]);
        let mut kv = kv.lock().unwrap();
        if kv.contains_key(&key) {
            return Json(json!({ "header": {} }));
        }
        let put = &body["success"][0]["request_put"];
        kv.insert(b64(&put["key"]), b64(&put["value"]));
        Json(json!({ "header": {}, "succeeded": true }))
    }

    async fn spawn_fake_etcd() -> SocketAddr {
        let kv: Kv = Arc::new(Mutex::new(BTreeMap::new()));
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({ "health": "true" })) }))
            .route("/v3/kv/range", post(range))
            .route("/v3/kv/put", post(put))
            .route("/v3/kv/deleterange", post(delete_range))
            .route("/v3/kv/txn", post(txn))
            .with_state(kv);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });
        addr
    }

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn range_end_increments_last_byte() {
        assert_eq!(prefix_range_end(b"a/"), b"a0".to_vec());
        assert_eq!(prefix_range_end(&[0x61, 0xff]), vec![0x62]);
        assert_eq!(prefix_range_end(&[0xff]), vec![0]);
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("karmada-dashboard"), "karmada-dashboard/");
        assert_eq!(normalize_prefix("/karmada-dashboard/"), "karmada-dashboard/");
        assert_eq!(normalize_prefix(""), "");
    }

    #[tokio::test]
    async fn connect_fails_without_endpoints() {
        let err = EtcdStore::connect(&[], "karmada-dashboard/").await.unwrap_err();
        assert!(err.to_string().contains("no etcd endpoints"));
    }

    #[tokio::test]
    async fn token_roundtrip_through_gateway() {
        let addr = spawn_fake_etcd().await;
        let store = EtcdStore::connect(&[format!("http://{addr}")], "karmada-dashboard/")
            .await
            .expect("connect");

        assert_eq!(store.service_account_token().await.unwrap(), None);
        store.put_service_account_token("sa-token").await.unwrap();
        assert_eq!(
            store.service_account_token().await.unwrap().as_deref(),
            Some("sa-token")
        );
        store.clear_service_account_token().await.unwrap();
        assert_eq!(store.service_account_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_key_follows_prefix() {
        let addr = spawn_fake_etcd().await;
        let endpoints = [format!("http://{addr}")];
        let default = EtcdStore::connect(&endpoints, "karmada-dashboard/")
            .await
            .expect("connect");
        let tenant = EtcdStore::connect(&endpoints, "tenant-a")
            .await
            .expect("connect");
        assert_eq!(default.token_key(), "karmada-dashboard/service-account-token");
        assert_eq!(tenant.token_key(), "tenant-a/service-account-token");

        default.put_service_account_token("shared-token").await.unwrap();
        assert_eq!(tenant.service_account_token().await.unwrap(), None);
        tenant.put_service_account_token("tenant-token").await.unwrap();
        assert_eq!(
            default.service_account_token().await.unwrap().as_deref(),
            Some("shared-token")
        );
    }

    #[tokio::test]
    async fn users_create_conflict_list_delete() {
        let addr = spawn_fake_etcd().await;
        let store = EtcdStore::connect(
            &["http://127.0.0.1:1".to_string(), format!("http://{addr}")],
            "karmada-dashboard",
        )
        .await
        .expect("connect falls through to live endpoint");

        store.create_user(user("bob")).await.unwrap();
        store.create_user(user("alice")).await.unwrap();
        let err = store.create_user(user("bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let names: Vec<String> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);

        store
            .put_user_settings(UserSettings {
                username: "bob".to_string(),
                clusters: vec![],
            })
            .await
            .unwrap();
        store.delete_user("bob").await.unwrap();
        assert!(store.get_user("bob").await.unwrap().is_none());
        assert!(store.user_settings("bob").await.unwrap().is_none());
        assert!(matches!(
            store.delete_user("bob").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
