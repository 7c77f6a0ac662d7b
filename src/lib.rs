use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::error::Error;
use tower_http::cors::CorsLayer;

use crate::handler::{AppState, create_bookmarks, get_bookmarks, not_found, service_info, update_bookmarks};

/// Room for the JSON envelope around a payload of `max_sync_size` bytes.
const BODY_ENVELOPE_BYTES: usize = 64 * 1024;

pub mod api;
pub mod bookmarks;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod store;

pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|e| anyhow::anyhow!("invalid allowed_origin {allowed_origin:?}: {e}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("accept-version")]))
}

/// Builds the sync API. `OPTIONS` on any path is answered by the CORS layer.
pub fn router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.app.allowed_origin)?;
    let body_limit = usize::try_from(state.config.app.max_sync_size)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_ENVELOPE_BYTES);

    Ok(Router::new()
        .route("/info", get(service_info).fallback(not_found))
        .route("/bookmarks", post(create_bookmarks).fallback(not_found))
        .route(
            "/bookmarks/*path",
            get(get_bookmarks).put(update_bookmarks).fallback(not_found),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(middleware::log_request))
        .layer(cors)
        .with_state(state))
}

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
