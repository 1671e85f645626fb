use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named subject/body pair with `{{variable}}` placeholders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateDefinition {
    pub fn new(request: CreateTemplateRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            subject: request.subject,
            body: request.body,
            is_default: request.is_default,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateTemplateRequest) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        self.updated_at = Utc::now();
    }
}

/// Request to add a template
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial update of a template
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub is_default: Option<bool>,
}

/// Preview render request
#[derive(Debug, Default, Deserialize)]
pub struct RenderTemplateRequest {
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Result of rendering a template
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
}
