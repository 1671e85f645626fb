use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id given to configurations supplied inline with a send request
pub const INLINE_CONFIG_ID: &str = "inline";

/// Normalized SMTP endpoint used by the send path.
///
/// Both the persisted shape and the inline request shape convert into this
/// type, so nothing past the boundary cares where a config came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub is_default: bool,
}

impl TransportConfig {
    /// Whether this config came with the request rather than from the store
    pub fn is_inline(&self) -> bool {
        self.id == INLINE_CONFIG_ID
    }
}

/// SMTP credentials as persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpAuth {
    pub user: String,
    pub pass: String,
}

/// Transport config as persisted in the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTransportConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub auth: SmtpAuth,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredTransportConfig {
    pub fn new(request: CreateTransportConfigRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            host: request.host,
            port: request.port,
            secure: request.secure,
            auth: SmtpAuth {
                user: request.user,
                pass: request.pass,
            },
            is_default: request.is_default,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, leaving absent fields untouched
    pub fn apply(&mut self, update: UpdateTransportConfigRequest) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(secure) = update.secure {
            self.secure = secure;
        }
        if let Some(user) = update.user {
            self.auth.user = user;
        }
        if let Some(pass) = update.pass {
            self.auth.pass = pass;
        }
        self.updated_at = Utc::now();
    }
}

impl From<StoredTransportConfig> for TransportConfig {
    fn from(stored: StoredTransportConfig) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            host: stored.host,
            port: stored.port,
            secure: stored.secure,
            user: stored.auth.user,
            password: stored.auth.pass,
            is_default: stored.is_default,
        }
    }
}

/// Transport override supplied with a send request
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InlineTransportConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    pub user: String,
    pub pass: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<InlineTransportConfig> for TransportConfig {
    fn from(inline: InlineTransportConfig) -> Self {
        Self {
            id: INLINE_CONFIG_ID.to_string(),
            name: inline.name.unwrap_or_else(|| inline.host.clone()),
            host: inline.host,
            port: inline.port,
            secure: inline.secure,
            user: inline.user,
            password: inline.pass,
            is_default: false,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Request to add a transport config
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransportConfigRequest {
    pub name: String,
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    pub user: String,
    pub pass: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial update of a transport config
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransportConfigRequest {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub is_default: Option<bool>,
}

/// Transport config returned to clients (credentials redacted)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfigView {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredTransportConfig> for TransportConfigView {
    fn from(stored: StoredTransportConfig) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            host: stored.host,
            port: stored.port,
            secure: stored.secure,
            user: stored.auth.user,
            is_default: stored.is_default,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}
