// ABOUTME: Coaching recommendation endpoints: generate, stream, quick actions, summary, latest and status updates
// ABOUTME: Thin handlers that authenticate the caller and delegate to CoachingService
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Recommendation routes
//!
//! Every handler requires a bearer token. The streaming endpoint emits one
//! JSON frame per SSE `data` field.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use super::json_event;
use crate::errors::AppError;
use crate::server::ServerResources;

/// Body of `PATCH /{id}/status`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePlanStatusRequest {
    /// completed, skipped or partial
    pub status: String,
    /// Optional athlete notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Recommendation routes handler
pub struct RecommendationRoutes;

impl RecommendationRoutes {
    /// Create all recommendation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/recommendations/generate", get(Self::generate))
            .route("/api/v1/recommendations/stream", get(Self::stream))
            .route(
                "/api/v1/recommendations/quick-actions",
                get(Self::quick_actions),
            )
            .route("/api/v1/recommendations/summary", get(Self::summary))
            .route("/api/v1/recommendations/latest", get(Self::latest))
            .route(
                "/api/v1/recommendations/:recommendation_id/status",
                patch(Self::update_status),
            )
            .route("/api/v1/recommendations/health", get(Self::health))
            .with_state(resources)
    }

    async fn generate(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let body = resources
            .coaching
            .generate_recommendations(&auth.user_id)
            .await
            .map_err(|e| e.with_user_id(&auth.user_id))?;
        Ok(Json(body))
    }

    async fn stream(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let events = resources
            .coaching
            .stream_recommendations(&auth.user_id)
            .map(|event| Ok(json_event(&event)));
        Ok(Sse::new(events).keep_alive(KeepAlive::default()))
    }

    async fn quick_actions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let actions = resources.coaching.quick_actions(&auth.user_id).await;
        Ok(Json(json!({
            "status": "success",
            "user_id": auth.user_id,
            "count": actions.len(),
            "quick_actions": actions,
        })))
    }

    async fn summary(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let summary = resources.coaching.data_summary(&auth.user_id).await;
        Ok(Json(json!({
            "status": "success",
            "user_id": auth.user_id,
            "data_summary": summary,
        })))
    }

    async fn latest(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let body = match resources.coaching.latest(&auth.user_id).await? {
            Some(recommendation) => json!({
                "status": "success",
                "recommendation": recommendation,
            }),
            None => json!({
                "status": "success",
                "recommendation": null,
                "message": "No recommendations found",
            }),
        };
        Ok(Json(body))
    }

    async fn update_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(recommendation_id): Path<String>,
        Json(request): Json<UpdatePlanStatusRequest>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let updated = resources
            .coaching
            .update_status(
                &auth.user_id,
                &recommendation_id,
                &request.status,
                request.notes,
            )
            .await
            .map_err(|e| e.with_resource_id(&recommendation_id))?;

        Ok(Json(json!({
            "success": true,
            "message": format!("Plan status updated to {}", updated.status),
            "recommendation_id": updated.id,
            "new_status": updated.status,
        })))
    }

    async fn health() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": "recommendations",
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
