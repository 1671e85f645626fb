use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::models::{
    CreateTransportConfigRequest, StoredTransportConfig, TransportConfigView,
    UpdateTransportConfigRequest,
};
use crate::state::AppState;

/// Transport config routes
pub fn config_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_configs).post(create_config))
        .route(
            "/{config_id}",
            get(get_config).put(update_config).delete(delete_config),
        )
        .route("/{config_id}/default", post(set_default_config))
}

fn validate_endpoint(name: &str, host: &str, port: u16) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Config name is required".to_string()));
    }
    if host.trim().is_empty() {
        return Err(AppError::BadRequest("SMTP host is required".to_string()));
    }
    if port == 0 {
        return Err(AppError::BadRequest("SMTP port must be non-zero".to_string()));
    }
    Ok(())
}

async fn load(state: &AppState, config_id: &str) -> Result<StoredTransportConfig> {
    state
        .configs
        .get_config(config_id)
        .await?
        .ok_or_else(|| AppError::ConfigNotFound(config_id.to_string()))
}

/// GET /api/v1/configs
async fn list_configs(State(state): State<AppState>) -> Result<Json<Vec<TransportConfigView>>> {
    let configs = state.configs.list_configs().await?;
    Ok(Json(configs.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/configs
async fn create_config(
    State(state): State<AppState>,
    Json(request): Json<CreateTransportConfigRequest>,
) -> Result<(StatusCode, Json<TransportConfigView>)> {
    validate_endpoint(&request.name, &request.host, request.port)?;

    let config = StoredTransportConfig::new(request);
    state.configs.save_config(&config).await?;

    tracing::info!(config_id = %config.id, host = %config.host, "Transport config created");

    Ok((StatusCode::CREATED, Json(config.into())))
}

/// GET /api/v1/configs/{config_id}
async fn get_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> Result<Json<TransportConfigView>> {
    Ok(Json(load(&state, &config_id).await?.into()))
}

/// PUT /api/v1/configs/{config_id}
async fn update_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    Json(request): Json<UpdateTransportConfigRequest>,
) -> Result<Json<TransportConfigView>> {
    let mut config = load(&state, &config_id).await?;
    let is_default = request.is_default;

    config.apply(request);
    validate_endpoint(&config.name, &config.host, config.port)?;
    // the default pointer only moves when the caller asks for it
    config.is_default = is_default == Some(true);

    state.configs.save_config(&config).await?;
    if is_default == Some(false) {
        state.configs.clear_default_config(&config.id).await?;
    }

    tracing::info!(config_id = %config.id, "Transport config updated");
    Ok(Json(load(&state, &config_id).await?.into()))
}

/// DELETE /api/v1/configs/{config_id}
async fn delete_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.configs.delete_config(&config_id).await? {
        return Err(AppError::ConfigNotFound(config_id));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/v1/configs/{config_id}/default
async fn set_default_config(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> Result<Json<TransportConfigView>> {
    if !state.configs.set_default_config(&config_id).await? {
        return Err(AppError::ConfigNotFound(config_id));
    }

    tracing::info!(config_id = %config_id, "Default transport config changed");
    Ok(Json(load(&state, &config_id).await?.into()))
}
