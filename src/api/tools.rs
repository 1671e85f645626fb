//! Tool-call surface for model agents: the same two send operations,
//! declared with JSON schemas and invoked by name.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::email::{validate_bulk, validate_send};
use crate::error::{AppError, Result};
use crate::models::{BulkSendRequest, SendRequest};
use crate::state::AppState;

pub const SEND_EMAIL: &str = "send_email";
pub const SEND_BULK_EMAIL: &str = "send_bulk_email";

/// Tool routes
pub fn tool_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools))
        .route("/call", post(call_tool))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

impl ToolCallResult {
    fn from_json<T: Serialize>(value: &T, is_error: bool) -> Result<Self> {
        Ok(Self {
            content: vec![ToolContent {
                kind: "text",
                text: serde_json::to_string(value)
                    .map_err(|e| AppError::InternalError(e.to_string()))?,
            }],
            is_error,
        })
    }
}

fn recipient_schema() -> Value {
    json!({
        "oneOf": [
            { "type": "string", "format": "email" },
            {
                "type": "object",
                "properties": {
                    "address": { "type": "string", "format": "email" },
                    "name": { "type": "string" }
                },
                "required": ["address"]
            }
        ]
    })
}

fn transport_schema() -> Value {
    json!({
        "type": "object",
        "description": "Inline SMTP settings; override configId and the default config",
        "properties": {
            "host": { "type": "string" },
            "port": { "type": "integer" },
            "secure": { "type": "boolean" },
            "user": { "type": "string" },
            "pass": { "type": "string" }
        },
        "required": ["host", "user", "pass"]
    })
}

fn shared_properties() -> serde_json::Map<String, Value> {
    let recipients = json!({ "type": "array", "items": recipient_schema() });
    let properties = json!({
        "subject": { "type": "string", "description": "Subject line, may contain {{placeholders}}" },
        "body": { "type": "string", "description": "HTML body, may contain {{placeholders}}" },
        "from": { "type": "string", "description": "Sender; defaults to the transport's account" },
        "cc": recipients.clone(),
        "bcc": recipients,
        "templateId": { "type": "string" },
        "templateData": { "type": "object", "additionalProperties": true },
        "useDefaultTemplate": { "type": "boolean" },
        "configId": { "type": "string" },
        "transport": transport_schema()
    });

    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Descriptors for every tool this service exposes
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let mut send = shared_properties();
    send.insert(
        "to".to_string(),
        json!({
            "oneOf": [
                recipient_schema(),
                { "type": "array", "items": recipient_schema(), "minItems": 1 }
            ]
        }),
    );

    let mut bulk = shared_properties();
    bulk.insert(
        "recipients".to_string(),
        json!({ "type": "array", "items": recipient_schema(), "minItems": 1 }),
    );
    bulk.insert(
        "batchSize".to_string(),
        json!({ "type": "integer", "minimum": 1, "default": 10 }),
    );
    bulk.insert(
        "delayBetweenBatches".to_string(),
        json!({ "type": "integer", "minimum": 0, "default": 1000, "description": "Milliseconds" }),
    );

    vec![
        ToolDescriptor {
            name: SEND_EMAIL,
            description: "Send one email (optionally from a template) to one or more recipients",
            input_schema: json!({ "type": "object", "properties": send, "required": ["to"] }),
        },
        ToolDescriptor {
            name: SEND_BULK_EMAIL,
            description: "Send an email to each recipient individually, in throttled batches",
            input_schema: json!({ "type": "object", "properties": bulk, "required": ["recipients"] }),
        },
    ]
}

/// GET /api/v1/tools
async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": tool_descriptors() }))
}

/// POST /api/v1/tools/call
async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolCallResult>> {
    tracing::info!(tool = %call.name, "Tool call");

    match call.name.as_str() {
        SEND_EMAIL => {
            let request: SendRequest = parse_arguments(call.arguments)?;
            validate_send(&request)?;
            let result = state.mailer.send(&request).await;
            Ok(Json(ToolCallResult::from_json(&result, !result.success)?))
        }
        SEND_BULK_EMAIL => {
            let request: BulkSendRequest = parse_arguments(call.arguments)?;
            validate_bulk(&request)?;
            let result = state.bulk.send_bulk(&request).await;
            Ok(Json(ToolCallResult::from_json(&result, !result.success)?))
        }
        other => Err(AppError::NotFound(format!("Unknown tool: {}", other))),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AppError::BadRequest(format!("Invalid tool arguments: {}", e)))
}
