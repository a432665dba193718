use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const RESPONSE_TARGET: &str = "pagebits::http::response";

/// Per-request identifier, visible to handlers and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let context = RequestContext {
        request_id: Uuid::new_v4(),
    };
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    response
}

/// Log every 4xx/5xx response together with the `ErrorReport` the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.request_id.to_string())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !is_failure(status) {
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unreported", Vec::new()));
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        error!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            chain = ?chain,
            %request_id,
            "request failed"
        );
    } else {
        warn!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            chain = ?chain,
            %request_id,
            "request rejected"
        );
    }

    response
}

fn is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}
