// ABOUTME: CORS layer configuration for the StrideIQ HTTP API
// ABOUTME: Builds a tower-http CorsLayer from the configured origin list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Parse the configured origins; `*`, blank or unparseable lists allow any origin
#[must_use]
pub fn allowed_origins(config: &CorsConfig) -> AllowOrigin {
    let raw = config.allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    }
}

/// Configure CORS for the web and mobile clients
///
/// ```bash
/// # Allow all origins (development)
/// export CORS_ALLOWED_ORIGINS="*"
///
/// # Allow specific origins (production)
/// export CORS_ALLOWED_ORIGINS="https://app.strideiq.example,https://admin.strideiq.example"
/// ```
#[must_use]
pub fn setup_cors(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(config))
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
}
