use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use mailrelay_backend::api;
use mailrelay_backend::config::Config;
use mailrelay_backend::mail::testing::ScriptedFactory;
use mailrelay_backend::mail::{EventSink, ManualClock};
use mailrelay_backend::models::{CreateTransportConfigRequest, StoredTransportConfig};
use mailrelay_backend::state::AppState;
use mailrelay_backend::store::{ConfigStore, MemoryStore};

async fn app(factory: ScriptedFactory, with_default: bool) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    if with_default {
        let config = StoredTransportConfig::new(CreateTransportConfigRequest {
            name: "Default".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            secure: false,
            user: "relay@example.com".to_string(),
            pass: "secret".to_string(),
            is_default: true,
        });
        store.save_config(&config).await.unwrap();
    }

    let state = AppState::new(
        Config::default(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(factory),
        Arc::new(ManualClock::new()),
        EventSink::disabled(),
    );

    (api::create_router(state), store)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

#[tokio::test]
async fn test_send_end_to_end() {
    let factory = ScriptedFactory::succeeding("MID1");
    let (app, _store) = app(factory.clone(), true).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/email/send",
        Some(json!({"to": [{"address": "a@x.com"}], "subject": "S", "body": "B"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("MID1"));
    assert_eq!(body["templateFallbackUsed"], json!(false));

    let (status, logs) = call(&app, "GET", "/api/v1/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["success"], json!(true));
    assert_eq!(logs[0]["recipientEmail"], json!("a@x.com"));
    assert_eq!(factory.sent()[0].from, "relay@example.com");
}

#[tokio::test]
async fn test_malformed_send_rejected_before_transport() {
    let factory = ScriptedFactory::succeeding("MID");
    let (app, _store) = app(factory.clone(), true).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/email/send",
        Some(json!({"to": "a@x.com", "body": "B"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!(400));
    assert!(factory.attempts().is_empty());

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/email/send-bulk",
        Some(json!({"recipients": [], "subject": "S", "body": "B"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_send_reports_error_body() {
    let (app, _store) = app(ScriptedFactory::succeeding("MID"), false).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/email/send",
        Some(json!({"to": "a@x.com", "subject": "S", "body": "B"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("No default transport configuration"));
}

#[tokio::test]
async fn test_bulk_send_reports_failures() {
    let (app, store) = app(ScriptedFactory::failing_for(&["b@x.com"]), true).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/email/send-bulk",
        Some(json!({
            "recipients": ["a@x.com", {"address": "b@x.com", "name": "Bea"}, "c@x.com"],
            "subject": "S",
            "body": "B",
            "batchSize": 2
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["totalSent"], json!(2));
    assert_eq!(body["totalFailed"], json!(1));
    assert_eq!(body["failures"][0]["recipient"], json!("b@x.com"));
    assert_eq!(store.log_len(), 3);
}

#[tokio::test]
async fn test_inline_transport_overrides_default() {
    let factory = ScriptedFactory::succeeding("MID");
    let (app, _store) = app(factory.clone(), true).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/email/send",
        Some(json!({
            "to": "a@x.com",
            "subject": "S",
            "body": "B",
            "transport": {"host": "inline.example.com", "user": "inline@example.com", "pass": "p"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(factory.configs_used(), vec!["inline".to_string()]);
    assert_eq!(factory.sent()[0].from, "inline@example.com");
}

#[tokio::test]
async fn test_config_crud() {
    let (app, _store) = app(ScriptedFactory::succeeding("MID"), true).await;

    let (status, created) = call(
        &app,
        "POST",
        "/api/v1/configs",
        Some(json!({
            "name": "Backup",
            "host": "backup.example.com",
            "port": 2525,
            "user": "backup@example.com",
            "pass": "hunter2"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("pass").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, list) = call(&app, "GET", "/api/v1/configs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert!(!list.to_string().contains("hunter2"));

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/v1/configs/{}", id),
        Some(json!({"port": 465, "secure": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["port"], json!(465));

    let (status, default) = call(
        &app,
        "POST",
        &format!("/api/v1/configs/{}/default", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(default["isDefault"], json!(true));

    let (_, list) = call(&app, "GET", "/api/v1/configs", None).await;
    let defaults = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["isDefault"] == json!(true))
        .count();
    assert_eq!(defaults, 1);

    let (status, _) = call(&app, "DELETE", &format!("/api/v1/configs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &format!("/api/v1/configs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_without_default_flag_keeps_current_default() {
    let (app, store) = app(ScriptedFactory::succeeding("MID"), true).await;
    let original = store.get_default_config().await.unwrap().unwrap();

    let (_, created) = call(
        &app,
        "POST",
        "/api/v1/configs",
        Some(json!({"name": "Backup", "host": "backup.example.com", "user": "b@example.com", "pass": "p", "isDefault": true})),
    )
    .await;
    let backup = created["id"].as_str().unwrap().to_string();

    // editing the former default must not take the default back
    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/v1/configs/{}", original.id),
        Some(json!({"name": "Renamed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["isDefault"], json!(false));
    assert_eq!(store.get_default_config().await.unwrap().unwrap().id, backup);

    let (_, updated) = call(
        &app,
        "PUT",
        &format!("/api/v1/configs/{}", backup),
        Some(json!({"port": 2525})),
    )
    .await;
    assert_eq!(updated["isDefault"], json!(true));

    let (_, updated) = call(
        &app,
        "PUT",
        &format!("/api/v1/configs/{}", backup),
        Some(json!({"isDefault": false})),
    )
    .await;
    assert_eq!(updated["isDefault"], json!(false));
    assert!(store.get_default_config().await.unwrap().is_none());
}

#[tokio::test]
async fn test_template_flow() {
    let factory = ScriptedFactory::succeeding("MID");
    let (app, _store) = app(factory.clone(), true).await;

    let (status, template) = call(
        &app,
        "POST",
        "/api/v1/templates",
        Some(json!({"name": "welcome", "subject": "Hi {{name}}", "body": "<p>{{name}} / {{org}}</p>"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = template["id"].as_str().unwrap().to_string();

    let (status, preview) = call(
        &app,
        "POST",
        &format!("/api/v1/templates/{}/render", id),
        Some(json!({"data": {"name": "Ann"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview, json!({"subject": "Hi Ann", "body": "<p>Ann / {{org}}</p>"}));

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/email/send",
        Some(json!({"to": "a@x.com", "templateId": id, "templateData": {"name": "Ann", "org": "Acme"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["templateFallbackUsed"], json!(false));
    assert_eq!(factory.sent()[0].html, "<p>Ann / Acme</p>");

    let (status, _) = call(&app, "GET", "/api/v1/templates/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tool_interface() {
    let factory = ScriptedFactory::succeeding("MID7");
    let (app, _store) = app(factory.clone(), true).await;

    let (status, tools) = call(&app, "GET", "/api/v1/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["send_email", "send_bulk_email"]);
    assert!(tools["tools"][0]["inputSchema"]["properties"]["to"].is_object());

    let (status, result) = call(
        &app,
        "POST",
        "/api/v1/tools/call",
        Some(json!({
            "name": "send_bulk_email",
            "arguments": {"recipients": ["a@x.com", "b@x.com"], "subject": "S", "body": "B"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["isError"], json!(false));
    let text: Value =
        serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text["totalSent"], json!(2));

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/tools/call",
        Some(json!({"name": "delete_everything", "arguments": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/tools/call",
        Some(json!({"name": "send_email", "arguments": {"subject": "S"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let (app, _store) = app(ScriptedFactory::succeeding("MID"), false).await;

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
}
