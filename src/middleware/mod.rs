// ABOUTME: HTTP middleware for request tracing and cross-origin access
// ABOUTME: Layers applied once to the assembled router in the server module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod cors;
pub mod tracing;

// CORS configuration
pub use cors::setup_cors;

// Request tracing
pub use self::tracing::{log_requests, make_request_span, request_id, REQUEST_ID_HEADER};
