use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::models::{EmailLogEntry, StoredTransportConfig, TemplateDefinition};
use crate::store::{ConfigStore, EmailLog, Record, TemplateStore};

/// Records of one kind plus the id of the default one.
///
/// Every change to the default pointer happens under `default_id`'s lock,
/// and the flag on returned records is derived from it.
struct Table<R> {
    records: DashMap<String, R>,
    default_id: Mutex<Option<String>>,
}

impl<R: Record> Table<R> {
    fn new() -> Self {
        Self {
            records: DashMap::new(),
            default_id: Mutex::new(None),
        }
    }

    fn pointer(&self) -> Result<MutexGuard<'_, Option<String>>> {
        self.default_id
            .lock()
            .map_err(|_| AppError::InternalError("default pointer lock poisoned".to_string()))
    }

    fn with_flag(record: &R, default_id: Option<&str>) -> R {
        let mut record = record.clone();
        let is_default = default_id == Some(record.id());
        record.set_default(is_default);
        record
    }

    fn get(&self, id: &str) -> Result<Option<R>> {
        let default_id = self.pointer()?.clone();
        Ok(self
            .records
            .get(id)
            .map(|entry| Self::with_flag(entry.value(), default_id.as_deref())))
    }

    fn get_default(&self) -> Result<Option<R>> {
        let default_id = self.pointer()?.clone();
        let Some(id) = default_id else {
            return Ok(None);
        };
        Ok(self
            .records
            .get(&id)
            .map(|entry| Self::with_flag(entry.value(), Some(&id))))
    }

    fn list(&self) -> Result<Vec<R>> {
        let default_id = self.pointer()?.clone();
        let mut records: Vec<R> = self
            .records
            .iter()
            .map(|entry| Self::with_flag(entry.value(), default_id.as_deref()))
            .collect();
        records.sort_by_key(|r| r.created_at());
        Ok(records)
    }

    fn save(&self, record: &R) -> Result<()> {
        let mut default_id = self.pointer()?;
        self.records.insert(record.id().to_string(), record.clone());
        if record.is_default() {
            *default_id = Some(record.id().to_string());
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut default_id = self.pointer()?;
        let removed = self.records.remove(id).is_some();
        if default_id.as_deref() == Some(id) {
            *default_id = None;
        }
        Ok(removed)
    }

    fn set_default(&self, id: &str) -> Result<bool> {
        let mut default_id = self.pointer()?;
        if !self.records.contains_key(id) {
            return Ok(false);
        }
        *default_id = Some(id.to_string());
        Ok(true)
    }

    fn clear_default(&self, id: &str) -> Result<bool> {
        let mut default_id = self.pointer()?;
        if default_id.as_deref() != Some(id) {
            return Ok(false);
        }
        *default_id = None;
        Ok(true)
    }
}

/// In-process store, used for local runs and tests
pub struct MemoryStore {
    configs: Table<StoredTransportConfig>,
    templates: Table<TemplateDefinition>,
    logs: Mutex<VecDeque<EmailLogEntry>>,
    log_retention: usize,
}

impl MemoryStore {
    pub fn new(log_retention: usize) -> Self {
        Self {
            configs: Table::new(),
            templates: Table::new(),
            logs: Mutex::new(VecDeque::new()),
            log_retention: log_retention.max(1),
        }
    }

    /// Number of log entries currently held
    pub fn log_len(&self) -> usize {
        self.logs.lock().map(|logs| logs.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, id: &str) -> Result<Option<StoredTransportConfig>> {
        self.configs.get(id)
    }

    async fn get_default_config(&self) -> Result<Option<StoredTransportConfig>> {
        self.configs.get_default()
    }

    async fn list_configs(&self) -> Result<Vec<StoredTransportConfig>> {
        self.configs.list()
    }

    async fn save_config(&self, config: &StoredTransportConfig) -> Result<()> {
        self.configs.save(config)
    }

    async fn delete_config(&self, id: &str) -> Result<bool> {
        self.configs.delete(id)
    }

    async fn set_default_config(&self, id: &str) -> Result<bool> {
        self.configs.set_default(id)
    }

    async fn clear_default_config(&self, id: &str) -> Result<bool> {
        self.configs.clear_default(id)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, id: &str) -> Result<Option<TemplateDefinition>> {
        self.templates.get(id)
    }

    async fn get_default_template(&self) -> Result<Option<TemplateDefinition>> {
        self.templates.get_default()
    }

    async fn list_templates(&self) -> Result<Vec<TemplateDefinition>> {
        self.templates.list()
    }

    async fn save_template(&self, template: &TemplateDefinition) -> Result<()> {
        self.templates.save(template)
    }

    async fn delete_template(&self, id: &str) -> Result<bool> {
        self.templates.delete(id)
    }

    async fn set_default_template(&self, id: &str) -> Result<bool> {
        self.templates.set_default(id)
    }

    async fn clear_default_template(&self, id: &str) -> Result<bool> {
        self.templates.clear_default(id)
    }
}

#[async_trait]
impl EmailLog for MemoryStore {
    async fn append(&self, entry: &EmailLogEntry) -> Result<()> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|_| AppError::InternalError("email log lock poisoned".to_string()))?;

        logs.push_front(entry.clone());
        logs.truncate(self.log_retention);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<EmailLogEntry>> {
        let logs = self
            .logs
            .lock()
            .map_err(|_| AppError::InternalError("email log lock poisoned".to_string()))?;

        Ok(logs.iter().take(limit).cloned().collect())
    }
}
