pub mod error;
pub mod state;
pub mod status;
pub mod webhook;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::static_assets;
pub use state::AppState;

/// Dashboard, status API and Telegram webhook routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status))
        .route("/webhook", post(webhook::receive_update))
        .fallback(static_assets::static_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
