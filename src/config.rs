use std::env;

/// Which backend holds transport configs, templates and the email log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub email_log_retention: usize,
    pub default_batch_size: usize,
    pub default_batch_delay_ms: u64,
    pub max_batch_size: usize,
    pub rate_limit_per_minute: Option<u32>,
    pub smtp_timeout_seconds: u64,
    pub webhook_url: Option<String>,
    pub webhook_timeout_seconds: u64,
    pub event_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => StoreBackend::Redis,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::InvalidStoreBackend(other.to_string())),
        };

        let default_batch_size = env::var("DEFAULT_BATCH_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        if default_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            store_backend,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            email_log_retention: env::var("EMAIL_LOG_RETENTION")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),
            default_batch_size,
            default_batch_delay_ms: env::var("DEFAULT_BATCH_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            max_batch_size: env::var("MAX_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            rate_limit_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|limit: &u32| *limit > 0),
            smtp_timeout_seconds: env::var("SMTP_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            webhook_url: env::var("WEBHOOK_URL").ok().filter(|url| !url.is_empty()),
            webhook_timeout_seconds: env::var("WEBHOOK_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            event_queue_capacity: env::var("EVENT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|capacity: &usize| *capacity > 0)
                .unwrap_or(1024),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            store_backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            email_log_retention: 10_000,
            default_batch_size: 10,
            default_batch_delay_ms: 1000,
            max_batch_size: 100,
            rate_limit_per_minute: None,
            smtp_timeout_seconds: 30,
            webhook_url: None,
            webhook_timeout_seconds: 10,
            event_queue_capacity: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port")]
    InvalidPort,
    #[error("Unknown STORE_BACKEND '{0}' (expected 'redis' or 'memory')")]
    InvalidStoreBackend(String),
    #[error("DEFAULT_BATCH_SIZE must be greater than zero")]
    InvalidBatchSize,
}
