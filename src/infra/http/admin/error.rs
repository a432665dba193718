use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::{
    assemble::AssembleError, content::ContentError, error::ErrorReport, forms::FormErrors,
    groups::GroupError, pages::PageError, repos::RepoError,
};
use crate::infra::uploads::UploadStorageError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NAME_CLASH: &str = "name_clash";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const UPLOAD: &str = "upload_error";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Per-field messages for rejected content submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FormErrors>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    fields: Option<FormErrors>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            fields: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn validation(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION_FAILED,
            "Validation failed",
            Some(hint.into()),
        )
    }

    pub fn form(errors: FormErrors) -> Self {
        let mut error = Self::validation(errors.to_string());
        error.fields = Some(errors);
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                fields: self.fields,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::admin",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::NotFound => ApiError::not_found("Resource not found"),
            RepoError::InvalidInput { message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Integrity { message } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(message) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(message),
            ),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Validation(message) => ApiError::validation(message),
            ContentError::Slug(err) => ApiError::validation(err.to_string()),
            ContentError::Form(errors) => ApiError::form(errors),
            ContentError::NotFound { entity } => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            ContentError::Repo(err) => err.into(),
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Validation(message) => ApiError::validation(message),
            PageError::NotFound { entity } => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            PageError::Repo(err) => err.into(),
        }
    }
}

impl From<AssembleError> for ApiError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::NoGroups => {
                ApiError::validation("at least one group slug is required")
            }
            AssembleError::Group(GroupError::NotFound { slug }) => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("group `{slug}` not found")),
            ),
            AssembleError::Group(GroupError::Repo(err)) => err.into(),
            AssembleError::NameClash(err) => ApiError::new(
                StatusCode::CONFLICT,
                codes::NAME_CLASH,
                "Context name provided by more than one group",
                Some(err.to_string()),
            ),
        }
    }
}

impl From<UploadStorageError> for ApiError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::PayloadTooLarge { .. } => ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "Upload exceeds the request size limit",
                None,
            ),
            UploadStorageError::UnsupportedType { .. }
            | UploadStorageError::NotAnImage
            | UploadStorageError::EmptyPayload
            | UploadStorageError::PayloadStream { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::UPLOAD,
                "Failed to store upload",
                Some(err.to_string()),
            ),
            UploadStorageError::InvalidPath
            | UploadStorageError::SizeOverflow
            | UploadStorageError::Io(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::UPLOAD,
                "Failed to store upload",
                Some(err.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;

    #[test]
    fn name_clash_is_a_conflict() {
        let err: ApiError =
            AssembleError::NameClash(DomainError::name_clash("header", "home", "footer")).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, codes::NAME_CLASH);
    }

    #[test]
    fn form_errors_are_validation_failures() {
        let mut errors = FormErrors::default();
        errors.insert("bit_1", "This field is required.");
        let err: ApiError = ContentError::Form(errors).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, codes::VALIDATION_FAILED);
    }

    #[test]
    fn response_carries_report() {
        let response = ApiError::not_found("Resource not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
