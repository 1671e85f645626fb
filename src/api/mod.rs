pub mod configs;
pub mod email;
pub mod health;
pub mod logs;
pub mod templates;
pub mod tools;

use axum::Router;

use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .merge(health::health_routes())
        .with_state(state)
}

/// API v1 routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/email", email::email_routes())
        .nest("/configs", configs::config_routes())
        .nest("/templates", templates::template_routes())
        .nest("/logs", logs::log_routes())
        .nest("/tools", tools::tool_routes())
}
