use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{get_stats, list_visits, locate_visitor, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::ORIGIN]);

    Router::new()
        .route("/", get(locate_visitor))
        .route("/visits", get(list_visits))
        .route("/stats", get(get_stats))
        .layer(cors)
        .with_state(state)
}
