use std::sync::LazyLock;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};

use crate::error::{AppError, Result};
use crate::models::{EmailLogEntry, StoredTransportConfig, TemplateDefinition};
use crate::store::{ConfigStore, EmailLog, Record, TemplateStore};

const EMAIL_LOG_KEY: &str = "email_logs";

/// KEYS[1] record, KEYS[2] default pointer, ARGV[1] id
static SET_DEFAULT_IF_EXISTS: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            redis.call('SET', KEYS[2], ARGV[1])
            return 1
        end
        return 0
        ",
    )
});

/// KEYS[1] default pointer, ARGV[1] id
static CLEAR_DEFAULT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        ",
    )
});

/// Redis-backed store for configs, templates and the email log
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    log_retention: usize,
}

impl RedisStore {
    pub fn new(pool: Pool, log_retention: usize) -> Self {
        Self {
            pool,
            log_retention: log_retention.max(1),
        }
    }

    fn record_key<R: Record>(id: &str) -> String {
        format!("{}:{}", R::KIND, id)
    }

    fn index_key<R: Record>() -> String {
        format!("{}s", R::KIND)
    }

    fn default_key<R: Record>() -> String {
        format!("{}:default", R::KIND)
    }

    // ==================== Record Operations ====================

    fn with_flag<R: Record>(mut record: R, default_id: Option<&str>) -> R {
        let is_default = default_id == Some(record.id());
        record.set_default(is_default);
        record
    }

    async fn get_record<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let mut conn = self.pool.get().await?;
        let (json, default_id): (Option<String>, Option<String>) = redis::pipe()
            .atomic()
            .get(Self::record_key::<R>(id))
            .get(Self::default_key::<R>())
            .query_async(&mut *conn)
            .await?;

        match json {
            Some(data) => {
                let record: R = serde_json::from_str(&data)?;
                Ok(Some(Self::with_flag(record, default_id.as_deref())))
            }
            None => Ok(None),
        }
    }

    async fn get_default_record<R: Record>(&self) -> Result<Option<R>> {
        let mut conn = self.pool.get().await?;
        let default_id: Option<String> = conn.get(Self::default_key::<R>()).await?;

        match default_id {
            Some(id) => {
                let json: Option<String> = conn.get(Self::record_key::<R>(&id)).await?;
                match json {
                    Some(data) => {
                        let record: R = serde_json::from_str(&data)?;
                        Ok(Some(Self::with_flag(record, Some(&id))))
                    }
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    async fn list_records<R: Record>(&self) -> Result<Vec<R>> {
        let mut conn = self.pool.get().await?;
        let (ids, default_id): (Vec<String>, Option<String>) = redis::pipe()
            .atomic()
            .smembers(Self::index_key::<R>())
            .get(Self::default_key::<R>())
            .query_async(&mut *conn)
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn.get(Self::record_key::<R>(&id)).await?;
            if let Some(data) = json {
                match serde_json::from_str::<R>(&data) {
                    Ok(record) => records.push(Self::with_flag(record, default_id.as_deref())),
                    Err(e) => {
                        tracing::warn!(kind = R::KIND, id = %id, error = %e, "Skipping unreadable record")
                    }
                }
            }
        }

        records.sort_by_key(|r| r.created_at());
        Ok(records)
    }

    /// Writes the record and, when it is marked default, moves the default
    /// pointer to it in the same transaction
    async fn save_record<R: Record>(&self, record: &R) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(record)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(Self::record_key::<R>(record.id()), &json)
            .ignore()
            .sadd(Self::index_key::<R>(), record.id())
            .ignore();
        if record.is_default() {
            pipe.set(Self::default_key::<R>(), record.id()).ignore();
        }
        let _: () = pipe.query_async(&mut *conn).await?;

        tracing::debug!(kind = R::KIND, id = %record.id(), "Record saved");
        Ok(())
    }

    async fn delete_record<R: Record>(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let (removed,): (usize,) = redis::pipe()
            .atomic()
            .del(Self::record_key::<R>(id))
            .srem(Self::index_key::<R>(), id)
            .ignore()
            .query_async(&mut *conn)
            .await?;
        let _: i64 = CLEAR_DEFAULT
            .key(Self::default_key::<R>())
            .arg(id)
            .invoke_async(&mut *conn)
            .await?;

        if removed > 0 {
            tracing::info!(kind = R::KIND, id = %id, "Record deleted");
        }
        Ok(removed > 0)
    }

    async fn set_default_record<R: Record>(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let changed: i64 = SET_DEFAULT_IF_EXISTS
            .key(Self::record_key::<R>(id))
            .key(Self::default_key::<R>())
            .arg(id)
            .invoke_async(&mut *conn)
            .await?;

        Ok(changed == 1)
    }

    async fn clear_default_record<R: Record>(&self, id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let cleared: i64 = CLEAR_DEFAULT
            .key(Self::default_key::<R>())
            .arg(id)
            .invoke_async(&mut *conn)
            .await?;

        Ok(cleared == 1)
    }

    // ==================== Health Check ====================

    async fn ping(&self) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::RedisError(e.to_string()))?;

        Ok(pong == "PONG")
    }
}

#[async_trait]
impl ConfigStore for RedisStore {
    async fn get_config(&self, id: &str) -> Result<Option<StoredTransportConfig>> {
        self.get_record(id).await
    }

    async fn get_default_config(&self) -> Result<Option<StoredTransportConfig>> {
        self.get_default_record().await
    }

    async fn list_configs(&self) -> Result<Vec<StoredTransportConfig>> {
        self.list_records().await
    }

    async fn save_config(&self, config: &StoredTransportConfig) -> Result<()> {
        self.save_record(config).await
    }

    async fn delete_config(&self, id: &str) -> Result<bool> {
        self.delete_record::<StoredTransportConfig>(id).await
    }

    async fn set_default_config(&self, id: &str) -> Result<bool> {
        self.set_default_record::<StoredTransportConfig>(id).await
    }

    async fn clear_default_config(&self, id: &str) -> Result<bool> {
        self.clear_default_record::<StoredTransportConfig>(id).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.ping().await
    }
}

#[async_trait]
impl TemplateStore for RedisStore {
    async fn get_template(&self, id: &str) -> Result<Option<TemplateDefinition>> {
        self.get_record(id).await
    }

    async fn get_default_template(&self) -> Result<Option<TemplateDefinition>> {
        self.get_default_record().await
    }

    async fn list_templates(&self) -> Result<Vec<TemplateDefinition>> {
        self.list_records().await
    }

    async fn save_template(&self, template: &TemplateDefinition) -> Result<()> {
        self.save_record(template).await
    }

    async fn delete_template(&self, id: &str) -> Result<bool> {
        self.delete_record::<TemplateDefinition>(id).await
    }

    async fn set_default_template(&self, id: &str) -> Result<bool> {
        self.set_default_record::<TemplateDefinition>(id).await
    }

    async fn clear_default_template(&self, id: &str) -> Result<bool> {
        self.clear_default_record::<TemplateDefinition>(id).await
    }
}

#[async_trait]
impl EmailLog for RedisStore {
    async fn append(&self, entry: &EmailLogEntry) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(entry)?;

        conn.lpush::<_, _, ()>(EMAIL_LOG_KEY, &json).await?;
        conn.ltrim::<_, ()>(EMAIL_LOG_KEY, 0, self.log_retention as isize - 1)
            .await?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<EmailLogEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.get().await?;
        let data: Vec<String> = conn.lrange(EMAIL_LOG_KEY, 0, limit as isize - 1).await?;

        Ok(data
            .into_iter()
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect())
    }
}
