pub mod health;
pub mod predict;

use axum::{Router, extract::DefaultBodyLimit, http::header::CONTENT_TYPE};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(predict::routes())
}

/// Routes plus body limit and CORS, bound to the shared state
pub fn build_app(state: Arc<AppState>, max_upload_size: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([CONTENT_TYPE]);

    build_routes()
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(cors)
        .with_state(state)
}
