// ABOUTME: Liveness and readiness endpoints for load balancers and monitoring
// ABOUTME: Readiness also pings the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::constants::service_names;
use crate::server::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .route("/ready", get(Self::ready))
            .with_state(resources)
    }

    async fn health() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": service_names::STRIDEIQ_SERVER,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }

    async fn ready(State(resources): State<Arc<ServerResources>>) -> (StatusCode, Json<Value>) {
        let database_ok = sqlx::query("SELECT 1")
            .execute(resources.database.pool())
            .await
            .is_ok();
        let status = if database_ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            status,
            Json(json!({
                "status": if database_ok { "ready" } else { "unavailable" },
                "database": database_ok,
                "timestamp": Utc::now().to_rfc3339(),
            })),
        )
    }
}
