//! API handlers for the catalog REST endpoints

pub mod health;
pub mod import;
pub mod items;
pub mod openapi;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state.services.import.max_upload_bytes();

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/libraries/:slug/columns", get(items::get_columns))
        .route("/libraries/:slug/items", get(items::list_items).post(items::create_item))
        .route("/libraries/:slug/items/search", get(items::search_items))
        .route("/libraries/:slug/items/lookup", post(items::lookup_items))
        .route("/libraries/:slug/items/:id", get(items::get_item).put(items::update_item))
        // Import
        .route(
            "/libraries/:slug/import",
            post(import::import_table).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
