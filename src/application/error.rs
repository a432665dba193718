use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        assemble::AssembleError, groups::GroupError, pages::PageError, repos::RepoError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text error for the public surface; details go to the report only.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

const ASSEMBLE_SOURCE: &str = "application::error::assemble_error_to_http_error";
const PAGE_SOURCE: &str = "application::error::page_error_to_http_error";

fn repo_failure(source: &'static str, err: &RepoError) -> HttpError {
    let status = match err {
        RepoError::Timeout | RepoError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = if status == StatusCode::SERVICE_UNAVAILABLE {
        "Service temporarily unavailable"
    } else {
        "Internal server error"
    };
    HttpError::from_error(source, status, message, err)
}

impl From<AssembleError> for HttpError {
    fn from(error: AssembleError) -> Self {
        match error {
            AssembleError::Group(GroupError::NotFound { slug }) => HttpError::new(
                ASSEMBLE_SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                format!("Group `{slug}` does not exist"),
            ),
            AssembleError::Group(GroupError::Repo(err)) => repo_failure(ASSEMBLE_SOURCE, &err),
            AssembleError::NoGroups => HttpError::new(
                ASSEMBLE_SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service misconfigured",
                "no groups configured for this view",
            ),
            AssembleError::NameClash(err) => HttpError::from_error(
                ASSEMBLE_SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Content misconfigured",
                &err,
            ),
        }
    }
}

impl From<PageError> for HttpError {
    fn from(error: PageError) -> Self {
        match error {
            PageError::NotFound { entity } => HttpError::new(
                PAGE_SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                format!("{entity} not found"),
            ),
            PageError::Validation(message) => HttpError::new(
                PAGE_SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                message,
            ),
            PageError::Repo(err) => repo_failure(PAGE_SOURCE, &err),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Infra(InfraError::Database(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Domain(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NameClash { .. }) => "Content misconfigured",
            AppError::Infra(InfraError::Database(_)) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Migration(_)) => "Database schema is out of date",
            AppError::Infra(InfraError::Configuration(_)) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Infra(InfraError::Render(_)) => "Page could not be rendered",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_clash_is_a_server_error() {
        let err: HttpError = AssembleError::NameClash(DomainError::name_clash(
            "header", "home", "footer",
        ))
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.report.messages[0].contains("header"));
    }

    #[test]
    fn missing_group_maps_to_not_found() {
        let err: HttpError = AssembleError::Group(GroupError::NotFound {
            slug: "ghost".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn app_error_response_carries_report() {
        let response = AppError::Infra(InfraError::render("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["render failed: boom".to_string()]);
    }
}
