//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/trmnl-data",
            get(handlers::trmnl_data).post(handlers::trmnl_data_post),
        )
        .route(
            "/calibre-status",
            get(handlers::trmnl_data).post(handlers::trmnl_data_post),
        )
        .route("/trmnl-recent", get(handlers::trmnl_recent))
        .route("/health", get(handlers::health))
        .route("/debug", get(handlers::debug))
        .route("/config", get(handlers::config))
        .route(
            "/clear-cache",
            get(handlers::clear_cache).post(handlers::clear_cache),
        )
        .route("/sync", post(handlers::sync))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
