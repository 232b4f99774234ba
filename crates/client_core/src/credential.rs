//! Provider credential validation and persistence.

use anyhow::Result;
use async_trait::async_trait;
use storage::Storage;
use thiserror::Error;
use tokio::sync::Mutex;

pub const STORAGE_KEY: &str = "dramabench_openrouter_api_key";
pub const REQUIRED_PREFIX: &str = "sk-or-v1-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Please enter an API key")]
    Empty,
    #[error("Invalid API key format. Should start with \"sk-or-v1-\"")]
    InvalidFormat,
}

/// Trims `raw` and checks the provider's key prefix.
pub fn validate_credential(raw: &str) -> Result<String, CredentialError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty);
    }
    if !key.starts_with(REQUIRED_PREFIX) {
        return Err(CredentialError::InvalidFormat);
    }
    Ok(key.to_string())
}

/// Masks all but the last four characters, for display.
pub fn mask_credential(key: &str) -> String {
    let visible: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{REQUIRED_PREFIX}…{visible}")
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

pub struct SqliteCredentialStore {
    storage: Storage,
}

impl SqliteCredentialStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        let storage = Storage::new(database_url).await?;
        storage.health_check().await?;
        Ok(Self::new(storage))
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        self.storage.get_setting(STORAGE_KEY).await
    }

    async fn save(&self, key: &str) -> Result<()> {
        self.storage.set_setting(STORAGE_KEY, key).await
    }

    async fn clear(&self) -> Result<()> {
        let removed = self.storage.remove_setting(STORAGE_KEY).await?;
        tracing::debug!(removed, "cleared stored credential");
        Ok(())
    }
}

/// Process-local store; nothing outlives the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Mutex::new(Some(key.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.key.lock().await.clone())
    }

    async fn save(&self, key: &str) -> Result<()> {
        *self.key.lock().await = Some(key.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.key.lock().await = None;
        Ok(())
    }
}
