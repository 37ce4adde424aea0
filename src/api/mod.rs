//! HTTP surface: the upload page and the JSON API

#[cfg(feature = "web")]
pub(crate) mod handlers;
#[cfg(feature = "web")]
mod page;
#[cfg(feature = "web")]
pub(crate) mod responses;

#[cfg(feature = "web")]
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
#[cfg(feature = "web")]
use serde_json::{json, Value};
#[cfg(feature = "web")]
use std::sync::Arc;
#[cfg(feature = "web")]
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
#[cfg(feature = "web")]
use crate::state::{AppState, Config};

#[cfg(feature = "web")]
pub(crate) use handlers::*;

#[cfg(feature = "web")]
/// Create the application router with all routes
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(config.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        // Upload form
        .route("/", get(page::index))
        .route("/api/health", get(health_check))
        .route("/api/catalog", get(catalog_info))
        // Analysis endpoint
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(feature = "web")]
/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::built_info::PKG_VERSION,
    }))
}
