//! In-memory implementation of the dashboard store.
//!
//! # Purpose
//! Implements the store traits with `HashMap`s guarded by `tokio::sync::RwLock`.
//! It exists for:
//! - local development and tests (no external dependencies)
//! - single-replica deployments where losing users on restart is acceptable
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: writes take a write lock, reads a read lock.
//! - The service-account token is a single slot; writes fully replace it.
use super::{
    DashboardStore, ServiceAccountTokenStore, StoreError, StoreResult, UserStore,
};
use crate::model::{UserRecord, UserSettings};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    /// Karmada service-account token, if initialized.
    service_account_token: Arc<RwLock<Option<String>>>,
    /// Legacy users keyed by username.
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    /// User settings keyed by username; independent of `users` so Keycloak
    /// identities can carry grants too.
    settings: Arc<RwLock<HashMap<String, UserSettings>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceAccountTokenStore for InMemoryStore {
    async fn service_account_token(&self) -> StoreResult<Option<String>> {
        Ok(self.service_account_token.read().await.clone())
    }

    async fn put_service_account_token(&self, token: &str) -> StoreResult<()> {
        *self.service_account_token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn clear_service_account_token(&self) -> StoreResult<()> {
        *self.service_account_token.write().await = None;
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn create_user(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        let removed = self.users.write().await.remove(username);
        if removed.is_none() {
            return Err(StoreError::NotFound(format!("user {username}")));
        }
        // Grants belong to the user; drop them with the account.
        self.settings.write().await.remove(username);
        Ok(())
    }

    async fn user_settings(&self, username: &str) -> StoreResult<Option<UserSettings>> {
        Ok(self.settings.read().await.get(username).cloned())
    }

    async fn put_user_settings(&self, settings: UserSettings) -> StoreResult<UserSettings> {
        self.settings
            .write()
            .await
            .insert(settings.username.clone(), settings.clone());
        Ok(settings)
    }
}

#[async_trait]
impl DashboardStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        // In-memory backend is always "healthy" if the process is running.
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
