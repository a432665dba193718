mod cache;
mod content;
mod error;
mod groups;
mod models;
mod pages;
mod state;

pub use state::AdminState;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    response::Response,
    routing::{delete, get, post, put},
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

pub fn build_admin_router(state: AdminState, upload_body_limit: usize) -> Router {
    Router::new()
        .route(
            "/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/groups/{id}",
            get(groups::group_definition)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/groups/{id}/bits", post(groups::create_bit))
        .route(
            "/bits/{id}",
            put(groups::update_bit).delete(groups::delete_bit),
        )
        .route(
            "/groups/{id}/content",
            get(content::content_form)
                .post(content::submit_content)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/groups/{id}/content/edit",
            get(content::content_form_page)
                .post(content::submit_content_page)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/templates",
            get(pages::list_templates).post(pages::create_template),
        )
        .route("/templates/{id}", delete(pages::delete_template))
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route(
            "/pages/{id}",
            get(pages::get_page)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/cache/clear", post(cache::clear_cache))
        .route("/cache/invalidate/{slug}", post(cache::invalidate_group))
        .route("/preview", post(cache::preview_context))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.db.as_ref()).await
}
