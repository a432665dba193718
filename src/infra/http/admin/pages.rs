use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use super::{
    AdminState,
    error::ApiError,
    models::{PageRequest, TemplateRequest},
};

pub(super) async fn list_templates(
    State(state): State<AdminState>,
) -> Result<impl IntoResponse, ApiError> {
    let templates = state.pages.list_templates().await?;
    Ok(Json(templates))
}

pub(super) async fn create_template(
    State(state): State<AdminState>,
    Json(payload): Json<TemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let template = state.pages.create_template(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub(super) async fn delete_template(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.pages.delete_template(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_pages(
    State(state): State<AdminState>,
) -> Result<impl IntoResponse, ApiError> {
    let pages = state.pages.list_pages().await?;
    Ok(Json(pages))
}

pub(super) async fn get_page(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let binding = state.pages.load_page(id).await?;
    Ok(Json(binding))
}

pub(super) async fn create_page(
    State(state): State<AdminState>,
    Json(payload): Json<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let binding = state.pages.create_page(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(binding)))
}

pub(super) async fn update_page(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let binding = state.pages.update_page(id, payload.into()).await?;
    Ok(Json(binding))
}

pub(super) async fn delete_page(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.pages.delete_page(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
