//! Built-in askama pages and the response helpers around them.
//!
//! Site pages come from the runtime Tera templates; only the fallback 404 and
//! the admin editor are compiled in.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::application::error::{ErrorReport, HttpError};

const SOURCE: &str = "pagebits::presentation::views";

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: &'static str,
    pub message: &'static str,
    pub home_href: Option<&'static str>,
}

impl ErrorTemplate {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found",
            message: "The page you requested does not exist.",
            home_href: Some("/"),
        }
    }
}

pub fn html_response(html: String, status: StatusCode) -> Response {
    (status, Html(html)).into_response()
}

/// Render a compiled template; a rendering failure becomes a reported 500.
pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => html_response(html, status),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Template rendering failed",
            &err,
        )
        .into_response(),
    }
}

/// Built-in 404 page, independent of the site templates.
pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(ErrorTemplate::not_found(), StatusCode::NOT_FOUND);
    if response.status() == StatusCode::NOT_FOUND {
        ErrorReport::from_message(
            SOURCE,
            StatusCode::NOT_FOUND,
            "no route or page matches the request path",
        )
        .attach(&mut response);
    }
    response
}
