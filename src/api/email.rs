use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use crate::error::{AppError, Result};
use crate::models::{BulkSendRequest, BulkSendResult, Recipient, SendRequest, SendResult};
use crate::state::AppState;

/// Email routes
pub fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_email))
        .route("/send-bulk", post(send_bulk_email))
}

fn validate_recipients<'a>(
    field: &str,
    recipients: impl IntoIterator<Item = &'a Recipient>,
) -> Result<usize> {
    let mut count = 0;
    for recipient in recipients {
        if recipient.address.is_empty() || !recipient.address.contains('@') {
            return Err(AppError::BadRequest(format!(
                "Invalid address in '{}': '{}'",
                field, recipient.address
            )));
        }
        count += 1;
    }
    Ok(count)
}

fn validate_content(subject: &str, body: &str, references_template: bool) -> Result<()> {
    if references_template {
        return Ok(());
    }
    if subject.trim().is_empty() {
        return Err(AppError::BadRequest("Subject is required".to_string()));
    }
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Body is required".to_string()));
    }
    Ok(())
}

/// Reject malformed single sends before any store or transport is touched
pub fn validate_send(request: &SendRequest) -> Result<()> {
    if validate_recipients("to", request.to.iter())? == 0 {
        return Err(AppError::BadRequest("At least one recipient is required".to_string()));
    }
    validate_recipients("cc", &request.cc)?;
    validate_recipients("bcc", &request.bcc)?;
    validate_content(&request.subject, &request.body, request.references_template())
}

/// Reject malformed bulk sends before any store or transport is touched
pub fn validate_bulk(request: &BulkSendRequest) -> Result<()> {
    if validate_recipients("recipients", &request.recipients)? == 0 {
        return Err(AppError::BadRequest("At least one recipient is required".to_string()));
    }
    validate_recipients("cc", &request.cc)?;
    validate_recipients("bcc", &request.bcc)?;
    validate_content(&request.subject, &request.body, request.references_template())
}

fn status_for(success: bool) -> StatusCode {
    if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// POST /api/v1/email/send
async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResult>)> {
    validate_send(&request)?;

    let result = state.mailer.send(&request).await;
    Ok((status_for(result.success), Json(result)))
}

/// POST /api/v1/email/send-bulk
async fn send_bulk_email(
    State(state): State<AppState>,
    Json(request): Json<BulkSendRequest>,
) -> Result<(StatusCode, Json<BulkSendResult>)> {
    validate_bulk(&request)?;

    let result = state.bulk.send_bulk(&request).await;
    Ok((status_for(result.success), Json(result)))
}
