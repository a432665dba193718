use std::{io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    application::{
        assemble::{AssembleError, ContextAssembler},
        error::{AppError, HttpError},
        pages::{PageError, PageService},
    },
    config::ViewSettings,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        templates::TemplateEngine,
        uploads::{MediaUrls, UploadStorage, UploadStorageError},
    },
    presentation::views::{html_response, render_not_found_response},
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

const FALLBACK_SOURCE: &str = "pagebits::infra::http::public::page_fallback";

#[derive(Clone)]
pub struct HttpState {
    pub pages: Arc<PageService>,
    pub assembler: ContextAssembler,
    pub templates: Arc<TemplateEngine>,
    pub upload_storage: Arc<UploadStorage>,
    pub media: MediaUrls,
    pub db: Option<Arc<PostgresRepositories>>,
    pub views: Arc<Vec<ViewSettings>>,
}

/// Public router: configured views, stored media and health, with any 404
/// retried as a database page.
pub fn build_router(state: HttpState) -> Router {
    let mut router = Router::new();
    for view in state.views.iter() {
        let view = Arc::new(view.clone());
        router = router.route(
            &view.path.clone(),
            get(move |State(state): State<HttpState>| {
                let view = Arc::clone(&view);
                async move { configured_view(state, &view).await }
            }),
        );
    }

    let media_route = format!("{}{{*path}}", state.media.prefix());

    router
        .route("/_health/db", get(public_health))
        .route(&media_route, get(serve_upload))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), page_fallback))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Error)]
enum PageRenderError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Template(#[from] InfraError),
}

async fn configured_view(state: HttpState, view: &ViewSettings) -> Response {
    let context = match state.assembler.assemble(view.groups.as_slice()).await {
        Ok(context) => context,
        Err(err) => return HttpError::from(err).into_response(),
    };

    match Arc::clone(&state.templates)
        .render_blocking(view.template.clone(), context)
        .await
    {
        Ok(html) => html_response(html, StatusCode::OK),
        Err(err) => AppError::Infra(err).into_response(),
    }
}

/// Render the page stored for `path`, if there is one.
async fn render_page(state: &HttpState, path: &str) -> Result<Option<Response>, PageRenderError> {
    let Some(page) = state.pages.resolve_page(path).await? else {
        return Ok(None);
    };

    let context = state.assembler.assemble(page.groups.as_slice()).await?;
    let html = Arc::clone(&state.templates)
        .render_blocking(page.template_path, context)
        .await?;
    Ok(Some(html_response(html, StatusCode::OK)))
}

/// Retry every public 404 as a page lookup. The original 404 stands when no
/// page matches or the page fails to render.
async fn page_fallback(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    if response.status() != StatusCode::NOT_FOUND
        || !(method == Method::GET || method == Method::HEAD)
    {
        return response;
    }

    match render_page(&state, &path).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            debug!(target = FALLBACK_SOURCE, path = %path, "no page bound to path");
            response
        }
        Err(err) => {
            error!(
                target = FALLBACK_SOURCE,
                path = %path,
                error = %err,
                "page failed to render; keeping 404"
            );
            response
        }
    }
}

async fn not_found() -> Response {
    render_not_found_response()
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.as_ref()).await
}

async fn serve_upload(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
