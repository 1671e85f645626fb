use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::mail::template::render_template;
use crate::models::{
    CreateTemplateRequest, RenderTemplateRequest, RenderedTemplate, TemplateDefinition,
    UpdateTemplateRequest,
};
use crate::state::AppState;

/// Template routes
pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route(
            "/{template_id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/{template_id}/default", post(set_default_template))
        .route("/{template_id}/render", post(render_preview))
}

fn validate_template(template: &TemplateDefinition) -> Result<()> {
    if template.name.trim().is_empty() {
        return Err(AppError::BadRequest("Template name is required".to_string()));
    }
    if template.subject.trim().is_empty() {
        return Err(AppError::BadRequest("Template subject is required".to_string()));
    }
    if template.body.trim().is_empty() {
        return Err(AppError::BadRequest("Template body is required".to_string()));
    }
    Ok(())
}

async fn load(state: &AppState, template_id: &str) -> Result<TemplateDefinition> {
    state
        .templates
        .get_template(template_id)
        .await?
        .ok_or_else(|| AppError::TemplateNotFound(template_id.to_string()))
}

/// GET /api/v1/templates
async fn list_templates(State(state): State<AppState>) -> Result<Json<Vec<TemplateDefinition>>> {
    Ok(Json(state.templates.list_templates().await?))
}

/// POST /api/v1/templates
async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateDefinition>)> {
    let template = TemplateDefinition::new(request);
    validate_template(&template)?;

    state.templates.save_template(&template).await?;

    tracing::info!(template_id = %template.id, name = %template.name, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/v1/templates/{template_id}
async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateDefinition>> {
    Ok(Json(load(&state, &template_id).await?))
}

/// PUT /api/v1/templates/{template_id}
async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateDefinition>> {
    let mut template = load(&state, &template_id).await?;
    let is_default = request.is_default;

    template.apply(request);
    validate_template(&template)?;
    template.is_default = is_default == Some(true);

    state.templates.save_template(&template).await?;
    if is_default == Some(false) {
        state.templates.clear_default_template(&template.id).await?;
    }

    Ok(Json(load(&state, &template_id).await?))
}

/// DELETE /api/v1/templates/{template_id}
async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.templates.delete_template(&template_id).await? {
        return Err(AppError::TemplateNotFound(template_id));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/v1/templates/{template_id}/default
async fn set_default_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateDefinition>> {
    if !state.templates.set_default_template(&template_id).await? {
        return Err(AppError::TemplateNotFound(template_id));
    }

    Ok(Json(load(&state, &template_id).await?))
}

/// POST /api/v1/templates/{template_id}/render - preview without sending
async fn render_preview(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(request): Json<RenderTemplateRequest>,
) -> Result<Json<RenderedTemplate>> {
    let template = load(&state, &template_id).await?;
    Ok(Json(render_template(&template, &request.data)))
}
