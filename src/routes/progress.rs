// ABOUTME: Progress dashboard endpoint returning weekly stats, VO2max trend, recent plans and records
// ABOUTME: Authenticates the caller and serializes the ProgressService report as-is
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};

use crate::coaching::ProgressReport;
use crate::errors::AppError;
use crate::server::ServerResources;

/// Progress routes handler
pub struct ProgressRoutes;

impl ProgressRoutes {
    /// Create the progress route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/progress", get(Self::progress))
            .with_state(resources)
    }

    async fn progress(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ProgressReport>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let report = resources
            .progress
            .report(&auth.user_id)
            .await
            .map_err(|e| e.with_user_id(&auth.user_id))?;
        Ok(Json(report))
    }
}
