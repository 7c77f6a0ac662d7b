use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Logs method, uri, status and duration of every request.
pub async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(method = %method, uri = %uri, status = status.as_u16(), duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(method = %method, uri = %uri, status = status.as_u16(), duration_ms, "request rejected");
    } else {
        tracing::info!(method = %method, uri = %uri, status = status.as_u16(), duration_ms, "request completed");
    }

    response
}
