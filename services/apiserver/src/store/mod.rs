use crate::model::{UserRecord, UserSettings};
use async_trait::async_trait;
use thiserror::Error;

pub mod etcd;
pub mod memory;

/// Key name, under the store prefix, of the Karmada service-account token.
/// With the default prefix the full key is `karmada-dashboard/service-account-token`.
pub const SERVICE_ACCOUNT_TOKEN_NAME: &str = "service-account-token";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ServiceAccountTokenStore: Send + Sync {
    async fn service_account_token(&self) -> StoreResult<Option<String>>;
    /// Fully replaces the stored value; there is no read-modify-write.
    async fn put_service_account_token(&self, token: &str) -> StoreResult<()>;
    async fn clear_service_account_token(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>>;
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    async fn create_user(&self, user: UserRecord) -> StoreResult<UserRecord>;
    async fn delete_user(&self, username: &str) -> StoreResult<()>;

    async fn user_settings(&self, username: &str) -> StoreResult<Option<UserSettings>>;
    async fn put_user_settings(&self, settings: UserSettings) -> StoreResult<UserSettings>;
}

#[async_trait]
pub trait DashboardStore: ServiceAccountTokenStore + UserStore + Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
