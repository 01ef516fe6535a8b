// ABOUTME: Route module organization for the StrideIQ HTTP API
// ABOUTME: One router per area, all sharing Arc<ServerResources>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! HTTP routes
//!
//! Each area exposes a `XRoutes::routes(resources)` constructor and thin
//! handlers that authenticate the caller and delegate to a service.

use axum::response::sse::Event;
use serde::Serialize;
use serde_json::json;

/// Conversational coaching agent routes
pub mod coaching_chat;
/// Liveness and readiness
pub mod health;
/// Wearable data ingestion routes
pub mod health_sync;
/// Progress dashboard route
pub mod progress;
/// Coaching recommendation routes
pub mod recommendations;

pub use coaching_chat::CoachingChatRoutes;
pub use health::HealthRoutes;
pub use health_sync::HealthSyncRoutes;
pub use progress::ProgressRoutes;
pub use recommendations::RecommendationRoutes;

/// One SSE event whose data is the JSON encoding of `frame`
pub(crate) fn json_event<T: Serialize>(frame: &T) -> Event {
    match serde_json::to_string(frame) {
        Ok(data) => Event::default().data(data),
        Err(e) => Event::default().data(
            json!({
                "type": "error",
                "message": format!("Failed to encode event: {e}"),
            })
            .to_string(),
        ),
    }
}
