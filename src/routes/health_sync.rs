// ABOUTME: Wearable data ingestion endpoints, one batch route per sample kind plus sync status
// ABOUTME: Every batch is validated whole before anything is written
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::ingestion::{
    BatchResult, HeartRateInput, SampleBatch, SleepBatch, StepInput, Vo2MaxInput, WorkoutBatch,
};
use crate::server::ServerResources;

fn batch_response(result: BatchResult) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": result,
    }))
}

/// Health data sync routes handler
pub struct HealthSyncRoutes;

impl HealthSyncRoutes {
    /// Create all ingestion routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/v1/health/heart-rate/batch", post(Self::heart_rate))
            .route("/api/v1/health/steps/batch", post(Self::steps))
            .route("/api/v1/health/vo2max/batch", post(Self::vo2max))
            .route("/api/v1/health/workouts/batch", post(Self::workouts))
            .route("/api/v1/health/sleep/batch", post(Self::sleep))
            .route("/api/v1/health/sync-status", get(Self::sync_status))
            .with_state(resources)
    }

    async fn heart_rate(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(batch): Json<SampleBatch<HeartRateInput>>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let result = resources
            .ingestion
            .ingest_heart_rate(&auth.user_id, batch)
            .await?;
        Ok(batch_response(result))
    }

    async fn steps(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(batch): Json<SampleBatch<StepInput>>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let result = resources.ingestion.ingest_steps(&auth.user_id, batch).await?;
        Ok(batch_response(result))
    }

    async fn vo2max(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(batch): Json<SampleBatch<Vo2MaxInput>>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let result = resources
            .ingestion
            .ingest_vo2max(&auth.user_id, batch)
            .await?;
        Ok(batch_response(result))
    }

    async fn workouts(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(batch): Json<WorkoutBatch>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let result = resources
            .ingestion
            .ingest_workouts(&auth.user_id, batch)
            .await?;
        Ok(batch_response(result))
    }

    async fn sleep(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(batch): Json<SleepBatch>,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let result = resources.ingestion.ingest_sleep(&auth.user_id, batch).await?;
        Ok(batch_response(result))
    }

    async fn sync_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let auth = resources.authenticate(&headers)?;
        let statuses = resources.ingestion.sync_status(&auth.user_id).await?;
        Ok(Json(json!({
            "success": true,
            "user_id": auth.user_id,
            "data": statuses,
        })))
    }
}
