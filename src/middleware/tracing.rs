// ABOUTME: Request tracing for the HTTP API: one span per request plus an access-log line
// ABOUTME: Carries the caller's x-request-id (or a generated one) into the span
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Instant;

use axum::body::Body;
use axum::middleware::Next;
use axum::response::Response;
use http::Request;
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::database::elapsed_ms;
use crate::logging::AppLogger;

/// Header used to correlate requests across services
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id from the header, or a fresh `req_<uuid>`
#[must_use]
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| format!("req_{}", Uuid::new_v4().simple()), str::to_owned)
}

/// Span factory for `TraceLayer::make_span_with`
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    info_span!(
        "http_request",
        request_id = %request_id(request),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Access log: method, path, status and time to response headers
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    AppLogger::log_api_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        elapsed_ms(started),
        None,
    );
    response
}
