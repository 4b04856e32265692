//! Chess API - REST server for tournament management
//!
//! Provides JWT-authenticated HTTP endpoints for accounts, tournaments,
//! enrollments, matches and ratings, with role checks driven by a single
//! policy table.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use chess_core::ServerConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::api_routes(state.clone()))
        .merge(openapi::swagger_ui_router())
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.server) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// CORS policy from configuration
///
/// `*` allows any origin; an empty list disables CORS entirely.
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if config.cors_origins.is_empty() {
        return None;
    }

    let allow_origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.trim().parse().ok())
            .collect();

        if origins.is_empty() {
            warn!("CORS_ORIGINS contains no valid origins, CORS disabled");
            return None;
        }
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
    )
}
