//! Static map render server library.
//!
//! This module exposes the router and internal modules for testing purposes.

use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod overlay;
pub mod params;
pub mod state;

use state::AppState;

/// Router with every route and middleware layer.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route(
            "/render",
            get(handlers::render_get_handler).post(handlers::render_post_handler),
        )
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
