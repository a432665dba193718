//! Editor surface: the content form of a group, as JSON and as HTML, and
//! its multipart submission.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{
        Path, State,
        multipart::{Multipart, MultipartError},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::{
        content::ContentError,
        forms::{ContentForm, FormErrors, Submission, build_content_form},
    },
    domain::entities::{ImageRef, LoadedGroup},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::{
        admin::views::{GroupContentTemplate, build_content_form_view},
        views::render_template_response,
    },
};

use super::{AdminState, error::ApiError};

const SOURCE: &str = "pagebits::infra::http::admin::content";

/// Suffix of the checkbox that removes a stored image.
pub const CLEAR_SUFFIX: &str = "__clear";

enum SubmitOutcome {
    Saved(ContentForm),
    Rejected {
        form: ContentForm,
        submission: Submission,
        errors: FormErrors,
    },
}

pub(super) async fn content_form(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = state.content.load_group(id).await?;
    Ok(Json(build_content_form(&loaded)))
}

pub(super) async fn content_form_page(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let loaded = state.content.load_group(id).await?;
    let form = build_content_form(&loaded);
    Ok(render_form(&state, &form, None, false, StatusCode::OK))
}

pub(super) async fn submit_content(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    match submit(&state, id, &mut multipart).await? {
        SubmitOutcome::Saved(form) => Ok(Json(form)),
        SubmitOutcome::Rejected { errors, .. } => Err(ApiError::form(errors)),
    }
}

pub(super) async fn submit_content_page(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let response = match submit(&state, id, &mut multipart).await? {
        SubmitOutcome::Saved(form) => render_form(&state, &form, None, true, StatusCode::OK),
        SubmitOutcome::Rejected {
            form,
            submission,
            errors,
        } => render_form(
            &state,
            &form,
            Some((&submission, &errors)),
            false,
            StatusCode::BAD_REQUEST,
        ),
    };
    Ok(response)
}

fn render_form(
    state: &AdminState,
    form: &ContentForm,
    submitted: Option<(&Submission, &FormErrors)>,
    saved: bool,
    status: StatusCode,
) -> Response {
    let action = format!("/groups/{}/content/edit", form.group_id);
    let view = build_content_form_view(form, action, &state.media, submitted, saved);
    render_template_response(GroupContentTemplate { view }, status)
}

async fn submit(
    state: &AdminState,
    id: Uuid,
    multipart: &mut Multipart,
) -> Result<SubmitOutcome, ApiError> {
    let loaded = state.content.load_group(id).await?;
    let form = build_content_form(&loaded);

    let mut submission = Submission::new();
    if let Err(err) = read_submission(&state.upload_storage, &form, multipart, &mut submission).await
    {
        discard_images(&state.upload_storage, submission.images()).await;
        return Err(err);
    }

    match state.content.save_content(id, &submission).await {
        Ok(saved) => {
            prune_replaced_images(&state.upload_storage, &loaded, &saved).await;
            info!(target = SOURCE, group = %saved.group.slug, "content form saved");
            Ok(SubmitOutcome::Saved(build_content_form(&saved)))
        }
        Err(err) => {
            discard_images(&state.upload_storage, submission.images()).await;
            match err {
                ContentError::Form(errors) => Ok(SubmitOutcome::Rejected {
                    form,
                    submission,
                    errors,
                }),
                other => Err(other.into()),
            }
        }
    }
}

/// Collect text values and uploaded images for the form's own fields.
/// Fields the form does not know are ignored.
async fn read_submission(
    storage: &UploadStorage,
    form: &ContentForm,
    multipart: &mut Multipart,
    submission: &mut Submission,
) -> Result<(), ApiError> {
    let known: HashSet<&str> = form.fields.iter().map(|field| field.key.as_str()).collect();

    while let Some(field) = multipart.next_field().await.map_err(multipart_to_api)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(key) = name.strip_suffix(CLEAR_SUFFIX) {
            if known.contains(key) {
                let value = field.text().await.map_err(multipart_to_api)?;
                if is_checked(&value) {
                    submission.clear_image(key);
                }
            }
            continue;
        }

        if !known.contains(name.as_str()) {
            continue;
        }

        match field.file_name().map(str::to_string) {
            // A file input left empty by the browser.
            Some(filename) if filename.trim().is_empty() => continue,
            Some(filename) => {
                let stream = field.map(|chunk| chunk.map_err(stream_to_storage));
                let image = storage.store_image_stream(&filename, stream).await?;
                submission.set_image(name, image);
            }
            None => {
                let value = field.text().await.map_err(multipart_to_api)?;
                submission.set_text(name, value);
            }
        }
    }

    Ok(())
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "on" | "true" | "yes"
    )
}

async fn discard_images<'a>(
    storage: &UploadStorage,
    images: impl Iterator<Item = &'a ImageRef>,
) {
    for image in images {
        if let Err(err) = storage.delete(&image.stored_path).await {
            warn!(
                target = SOURCE,
                path = %image.stored_path,
                error = %err,
                "failed to remove discarded upload"
            );
        }
    }
}

/// Remove stored images that the save replaced or cleared.
async fn prune_replaced_images(storage: &UploadStorage, before: &LoadedGroup, after: &LoadedGroup) {
    let kept: HashSet<&str> = after
        .bits
        .iter()
        .filter_map(|entry| entry.data.image.as_ref())
        .map(|image| image.stored_path.as_str())
        .collect();

    let replaced = before
        .bits
        .iter()
        .filter_map(|entry| entry.data.image.as_ref())
        .filter(|image| !kept.contains(image.stored_path.as_str()));

    discard_images(storage, replaced).await;
}

fn stream_to_storage(err: MultipartError) -> UploadStorageError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadStorageError::PayloadTooLarge {
            source: Box::new(err),
        }
    } else {
        UploadStorageError::PayloadStream {
            source: Box::new(err),
        }
    }
}

fn multipart_to_api(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadStorageError::PayloadTooLarge {
            source: Box::new(err),
        }
        .into()
    } else {
        ApiError::bad_request("Invalid multipart payload", Some(err.body_text()))
    }
}
