//! Persistence for transport configs, templates and the email log.
//!
//! The send path only reads configs and templates and appends log
//! entries; the CRUD operations back the HTTP management routes.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{EmailLogEntry, StoredTransportConfig, TemplateDefinition};

/// Create a Redis connection pool
pub fn create_pool(config: &Config) -> Result<Pool> {
    let redis_config = RedisConfig::from_url(&config.redis_url);
    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| AppError::RedisError(format!("Failed to create Redis pool: {}", e)))?;

    Ok(pool)
}

/// Transport configuration store.
///
/// The default is a single pointer held by the store, and `is_default` on
/// returned records is derived from it, so at most one record reads as
/// default. `save_config` moves the pointer only when the record is marked
/// default; it never clears it. Use `clear_default_config` for that.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, id: &str) -> Result<Option<StoredTransportConfig>>;
    async fn get_default_config(&self) -> Result<Option<StoredTransportConfig>>;
    async fn list_configs(&self) -> Result<Vec<StoredTransportConfig>>;
    async fn save_config(&self, config: &StoredTransportConfig) -> Result<()>;
    async fn delete_config(&self, id: &str) -> Result<bool>;
    async fn set_default_config(&self, id: &str) -> Result<bool>;
    /// Unset the default if it currently points at `id`
    async fn clear_default_config(&self, id: &str) -> Result<bool>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Template store, same default discipline as [`ConfigStore`]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &str) -> Result<Option<TemplateDefinition>>;
    async fn get_default_template(&self) -> Result<Option<TemplateDefinition>>;
    async fn list_templates(&self) -> Result<Vec<TemplateDefinition>>;
    async fn save_template(&self, template: &TemplateDefinition) -> Result<()>;
    async fn delete_template(&self, id: &str) -> Result<bool>;
    async fn set_default_template(&self, id: &str) -> Result<bool>;
    async fn clear_default_template(&self, id: &str) -> Result<bool>;
}

/// Append-only record of send outcomes
#[async_trait]
pub trait EmailLog: Send + Sync {
    async fn append(&self, entry: &EmailLogEntry) -> Result<()>;
    /// Most recent entries first
    async fn recent(&self, limit: usize) -> Result<Vec<EmailLogEntry>>;
}

/// Keyed record with a default flag, shared by configs and templates
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn is_default(&self) -> bool;
    fn set_default(&mut self, is_default: bool);
    fn created_at(&self) -> DateTime<Utc>;
}

impl Record for StoredTransportConfig {
    const KIND: &'static str = "transport_config";

    fn id(&self) -> &str {
        &self.id
    }

    fn is_default(&self) -> bool {
        self.is_default
    }

    fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for TemplateDefinition {
    const KIND: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }

    fn is_default(&self) -> bool {
        self.is_default
    }

    fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
