use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::infra::templates::context_object;

use super::{AdminState, error::ApiError, models::PreviewRequest};

pub(super) async fn invalidate_group(
    State(state): State<AdminState>,
    Path(slug): Path<String>,
) -> Response {
    state.assembler.groups().invalidate(&slug).await;
    StatusCode::NO_CONTENT.into_response()
}

pub(super) async fn clear_cache(State(state): State<AdminState>) -> Response {
    state.assembler.groups().clear().await;
    StatusCode::NO_CONTENT.into_response()
}

/// Assemble the given groups exactly as a page would and return the
/// template-facing values. A name clash answers 409.
pub(super) async fn preview_context(
    State(state): State<AdminState>,
    Json(payload): Json<PreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state
        .assembler
        .assemble(payload.groups.as_slice())
        .await?;
    Ok(Json(context_object(&context, &state.media)))
}
