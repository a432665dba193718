use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::application::forms::GroupDefinitionView;

use super::{
    AdminState,
    error::ApiError,
    models::{CreateBitRequest, CreateGroupRequest, UpdateBitRequest, UpdateGroupRequest},
};

pub(super) async fn list_groups(
    State(state): State<AdminState>,
) -> Result<impl IntoResponse, ApiError> {
    let groups = state.content.list_groups().await?;
    Ok(Json(groups))
}

pub(super) async fn create_group(
    State(state): State<AdminState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let group = state.content.create_group(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Administrator view: group metadata plus bit definitions.
pub(super) async fn group_definition(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = state.content.load_group(id).await?;
    Ok(Json(GroupDefinitionView::from(&loaded)))
}

pub(super) async fn update_group(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let group = state.content.update_group(payload.into_command(id)).await?;
    Ok(Json(group))
}

pub(super) async fn delete_group(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.content.delete_group(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn create_bit(
    State(state): State<AdminState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<CreateBitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .content
        .create_bit(payload.into_command(group_id))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn update_bit(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bit = state.content.update_bit(payload.into_command(id)).await?;
    Ok(Json(bit))
}

pub(super) async fn delete_bit(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.content.delete_bit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
