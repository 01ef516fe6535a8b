// ABOUTME: Conversational coaching endpoints, blocking and SSE streaming
// ABOUTME: Validates the message and session before any model call, then hands the turn to AgentRuntime
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::info;

use super::json_event;
use crate::errors::AppError;
use crate::server::ServerResources;

/// Body shared by both chat endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct CoachingChatRequest {
    /// User message, 1 to 1000 characters after trimming
    pub message: String,
    /// Existing session to continue
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Coaching chat routes handler
pub struct CoachingChatRoutes;

impl CoachingChatRoutes {
    /// Create all coaching chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/coaching/chat", post(Self::chat))
            .route("/api/v1/coaching/chat/", post(Self::chat))
            .route("/api/v1/coaching/chat/stream", post(Self::chat_stream))
            .with_state(resources)
    }

    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CoachingChatRequest>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let turn = resources
            .agent
            .prepare(&auth.user_id, &request.message, request.session_id.as_deref())
            .await
            .map_err(|e| e.with_user_id(&auth.user_id))?;
        info!(user_id = %auth.user_id, session_id = %turn.session_id(), "Coaching chat turn");

        let reply = resources.agent.run_prepared(&auth.user_id, turn).await?;
        Ok(Json(json!({
            "success": true,
            "session_id": reply.session_id,
            "message": reply.message,
            "timestamp": reply.timestamp.to_rfc3339(),
        })))
    }

    async fn chat_stream(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<CoachingChatRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let turn = resources
            .agent
            .prepare(&auth.user_id, &request.message, request.session_id.as_deref())
            .await
            .map_err(|e| e.with_user_id(&auth.user_id))?;
        info!(user_id = %auth.user_id, session_id = %turn.session_id(), "Coaching chat stream");

        let events = resources
            .agent
            .stream_prepared(&auth.user_id, turn)
            .map(|event| Ok(json_event(&event)));
        Ok(Sse::new(events).keep_alive(KeepAlive::default()))
    }
}
