use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::error::Result;
use crate::models::EmailLogEntry;
use crate::state::AppState;

/// Email log routes
pub fn log_routes() -> Router<AppState> {
    Router::new().route("/", get(list_logs))
}

#[derive(serde::Deserialize)]
struct ListLogsQuery {
    limit: Option<usize>,
}

/// GET /api/v1/logs - Most recent send outcomes
async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<Vec<EmailLogEntry>>> {
    let limit = query.limit.unwrap_or(50).min(500);
    Ok(Json(state.email_log.recent(limit).await?))
}
