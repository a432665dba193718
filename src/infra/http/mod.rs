mod admin;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use middleware::{RequestContext, log_responses, set_request_context};
pub use public::{HttpState, build_router};

use std::sync::Arc;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const HEALTH_SOURCE: &str = "infra::http::db_health";

/// 204 when the database answers, 503 with a diagnostic otherwise.
async fn db_health_response(db: Option<&Arc<PostgresRepositories>>) -> Response {
    let Some(db) = db else {
        let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
        ErrorReport::from_message(
            HEALTH_SOURCE,
            StatusCode::SERVICE_UNAVAILABLE,
            "no database attached",
        )
        .attach(&mut response);
        return response;
    };

    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(HEALTH_SOURCE, StatusCode::SERVICE_UNAVAILABLE, &err)
                .attach(&mut response);
            response
        }
    }
}
