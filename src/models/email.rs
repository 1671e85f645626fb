use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::transport::InlineTransportConfig;

/// Template substitution data
pub type TemplateData = Map<String, Value>;

/// Either a single value or a list, preserving the caller's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> OneOrMany<U> {
        match self {
            OneOrMany::One(item) => OneOrMany::One(f(item)),
            OneOrMany::Many(items) => OneOrMany::Many(items.iter().map(f).collect()),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl From<Recipient> for OneOrMany<Recipient> {
    fn from(recipient: Recipient) -> Self {
        OneOrMany::One(recipient)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// Recipient address with optional display name.
///
/// Accepts either a bare address string or `{"address": .., "name": ..}`
/// (`email` / `displayName` are accepted as aliases).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecipientInput")]
pub struct Recipient {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipientInput {
    Address(String),
    Detailed {
        #[serde(alias = "email")]
        address: String,
        #[serde(default, alias = "displayName")]
        name: Option<String>,
    },
}

impl From<RecipientInput> for Recipient {
    fn from(input: RecipientInput) -> Self {
        match input {
            RecipientInput::Address(address) => Recipient::new(address.trim()),
            RecipientInput::Detailed { address, name } => Recipient {
                address: address.trim().to_string(),
                name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            },
        }
    }
}

/// One logical send
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: OneOrMany<Recipient>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub cc: Vec<Recipient>,
    #[serde(default)]
    pub bcc: Vec<Recipient>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_data: TemplateData,
    #[serde(default)]
    pub use_default_template: bool,
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub transport: Option<InlineTransportConfig>,
}

impl SendRequest {
    pub fn new(
        to: impl Into<OneOrMany<Recipient>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
            cc: Vec::new(),
            bcc: Vec::new(),
            template_id: None,
            template_data: TemplateData::new(),
            use_default_template: false,
            config_id: None,
            transport: None,
        }
    }

    /// Whether subject/body may legitimately come from a template
    pub fn references_template(&self) -> bool {
        self.template_id.is_some() || self.use_default_template
    }
}

/// Bulk send: one logical send fanned out to every recipient
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendRequest {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub cc: Vec<Recipient>,
    #[serde(default)]
    pub bcc: Vec<Recipient>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_data: TemplateData,
    #[serde(default)]
    pub use_default_template: bool,
    #[serde(default)]
    pub config_id: Option<String>,
    #[serde(default)]
    pub transport: Option<InlineTransportConfig>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Pause between batches, in milliseconds
    #[serde(default)]
    pub delay_between_batches: Option<u64>,
}

impl BulkSendRequest {
    pub fn new(
        recipients: Vec<Recipient>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
            from: None,
            cc: Vec::new(),
            bcc: Vec::new(),
            template_id: None,
            template_data: TemplateData::new(),
            use_default_template: false,
            config_id: None,
            transport: None,
            batch_size: None,
            delay_between_batches: None,
        }
    }

    pub fn references_template(&self) -> bool {
        self.template_id.is_some() || self.use_default_template
    }

    /// Per-recipient request; the recipient's `email` and `name` are
    /// injected into the template data.
    pub fn request_for(&self, recipient: &Recipient) -> SendRequest {
        let mut template_data = self.template_data.clone();
        template_data.insert(
            "email".to_string(),
            Value::String(recipient.address.clone()),
        );
        template_data.insert(
            "name".to_string(),
            Value::String(recipient.name.clone().unwrap_or_default()),
        );

        SendRequest {
            to: OneOrMany::One(recipient.clone()),
            subject: self.subject.clone(),
            body: self.body.clone(),
            from: self.from.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            template_id: self.template_id.clone(),
            template_data,
            use_default_template: self.use_default_template,
            config_id: self.config_id.clone(),
            transport: self.transport.clone(),
        }
    }
}

/// Outcome of a single send
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub template_fallback_used: bool,
}

/// Per-recipient outcome inside a bulk send
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientResult {
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipientFailure {
    pub recipient: String,
    pub error: String,
}

/// Aggregated outcome of a bulk send
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendResult {
    pub success: bool,
    pub total_sent: usize,
    pub total_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<RecipientFailure>>,
    pub message: String,
}

/// Durable record of one send attempt for one recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub config_id: Option<String>,
    pub template_id: Option<String>,
    pub recipient_email: String,
    pub subject: String,
    pub success: bool,
    pub message: String,
}

impl EmailLogEntry {
    pub fn new(
        config_id: Option<String>,
        template_id: Option<String>,
        recipient_email: String,
        subject: String,
        success: bool,
        message: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            config_id,
            template_id,
            recipient_email,
            subject,
            success,
            message,
        }
    }
}
