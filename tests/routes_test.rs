// ABOUTME: End-to-end HTTP tests for the assembled router
// ABOUTME: Exercises auth, recommendations, progress, coaching chat and health sync endpoints through axum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    bearer, create_test_server_resources, create_test_user, ScriptedLlmProvider, ScriptedTurn,
};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use strideiq_server::server::{build_router, ServerResources};

async fn setup(turns: Vec<ScriptedTurn>) -> (Arc<ServerResources>, String, String) {
    let llm = Arc::new(ScriptedLlmProvider::new(common::sample_plan_json(), turns));
    let resources = create_test_server_resources(llm).await;
    let user_id = create_test_user(&resources.database).await;
    let token = bearer(&resources, &user_id);
    (resources, user_id, token)
}

#[tokio::test]
async fn test_health_and_ready_need_no_auth() {
    let (resources, _, _) = setup(Vec::new()).await;

    let health: Value = AxumTestRequest::get("/health")
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(health["status"], "healthy");

    let ready = AxumTestRequest::get("/ready")
        .send(build_router(resources))
        .await;
    assert_eq!(ready.status(), 200);
}

#[tokio::test]
async fn test_protected_routes_reject_missing_or_bad_tokens() {
    let (resources, _, _) = setup(Vec::new()).await;

    for uri in [
        "/api/v1/recommendations/latest",
        "/api/v1/recommendations/summary",
        "/api/v1/health/sync-status",
        "/api/v1/progress",
    ] {
        let response = AxumTestRequest::get(uri)
            .send(build_router(resources.clone()))
            .await;
        assert_eq!(response.status(), 401, "{uri} accepted a missing token");
    }

    let response = AxumTestRequest::get("/api/v1/recommendations/latest")
        .auth("Bearer not-a-jwt")
        .send(build_router(resources))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_generate_then_latest_then_status_update() {
    let (resources, _, token) = setup(Vec::new()).await;

    let empty: Value = AxumTestRequest::get("/api/v1/recommendations/latest")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert!(empty["recommendation"].is_null());
    assert_eq!(empty["message"], "No recommendations found");

    let generated: Value = AxumTestRequest::get("/api/v1/recommendations/generate")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(generated["status"], "success");
    let plan_id = generated["recommendation_id"].as_str().unwrap().to_owned();

    let latest: Value = AxumTestRequest::get("/api/v1/recommendations/latest")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .json();
    assert_eq!(latest["recommendation"]["id"], plan_id.as_str());
    assert_eq!(latest["recommendation"]["status"], "pending");

    let bad = AxumTestRequest::patch(&format!("/api/v1/recommendations/{plan_id}/status"))
        .auth(&token)
        .json(&json!({"status": "pending"}))
        .send(build_router(resources.clone()))
        .await;
    assert_eq!(bad.status(), 400);

    let updated: Value =
        AxumTestRequest::patch(&format!("/api/v1/recommendations/{plan_id}/status"))
            .auth(&token)
            .json(&json!({"status": "completed", "notes": "Felt strong"}))
            .send(build_router(resources))
            .await
            .assert_status(StatusCode::OK)
            .json();
    assert_eq!(updated["success"], true);
    assert_eq!(updated["new_status"], "completed");
    assert_eq!(updated["message"], "Plan status updated to completed");
}

#[tokio::test]
async fn test_status_update_on_foreign_plan_is_not_found() {
    let (resources, _, token) = setup(Vec::new()).await;
    let stranger = create_test_user(&resources.database).await;
    let stranger_token = bearer(&resources, &stranger);

    let generated: Value = AxumTestRequest::get("/api/v1/recommendations/generate")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .json();
    let plan_id = generated["recommendation_id"].as_str().unwrap();

    let response = AxumTestRequest::patch(&format!("/api/v1/recommendations/{plan_id}/status"))
        .auth(&stranger_token)
        .json(&json!({"status": "skipped"}))
        .send(build_router(resources))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_recommendation_stream_frames() {
    let (resources, _, token) = setup(Vec::new()).await;

    let events = AxumTestRequest::get("/api/v1/recommendations/stream")
        .auth(&token)
        .send_sse(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .sse_events();

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.first(), Some(&"status"));
    assert_eq!(kinds[1], "context");
    assert!(kinds.contains(&"chunk"));
    assert_eq!(&kinds[kinds.len() - 2..], ["complete", "done"]);
}

#[tokio::test]
async fn test_quick_actions_and_summary() {
    let (resources, user_id, token) = setup(Vec::new()).await;

    let actions: Value = AxumTestRequest::get("/api/v1/recommendations/quick-actions")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(actions["user_id"], user_id.as_str());
    assert_eq!(
        actions["count"].as_u64().unwrap() as usize,
        actions["quick_actions"].as_array().unwrap().len()
    );

    let summary: Value = AxumTestRequest::get("/api/v1/recommendations/summary")
        .auth(&token)
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(summary["data_summary"]["has_profile"], true);
}

#[tokio::test]
async fn test_progress_reflects_a_generated_plan() {
    let (resources, _, token) = setup(Vec::new()).await;

    AxumTestRequest::get("/api/v1/recommendations/generate")
        .auth(&token)
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK);

    let progress: Value = AxumTestRequest::get("/api/v1/progress")
        .auth(&token)
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(progress["current_week"]["total_workouts"], 1);
    assert_eq!(progress["current_week"]["completed_workouts"], 0);
    assert_eq!(progress["last_4_weeks"].as_array().unwrap().len(), 4);
    assert_eq!(progress["recent_workouts"][0]["status"], "pending");
    assert_eq!(progress["current_streak_days"], 0);
    assert!(progress["best_vo2_max"].is_null());
}

#[tokio::test]
async fn test_coaching_chat_round_trip() {
    let (resources, _, token) = setup(vec![
        ScriptedTurn::Text("Rest today, run tomorrow.".to_owned()),
        ScriptedTurn::Text("Yes, tomorrow.".to_owned()),
    ])
    .await;

    let first: Value = AxumTestRequest::post("/api/v1/coaching/chat")
        .auth(&token)
        .json(&json!({"message": "Should I run today?"}))
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(first["success"], true);
    assert_eq!(first["message"], "Rest today, run tomorrow.");
    let session_id = first["session_id"].as_str().unwrap();

    let second: Value = AxumTestRequest::post("/api/v1/coaching/chat/")
        .auth(&token)
        .json(&json!({"message": "Tomorrow then?", "session_id": session_id}))
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(second["session_id"], session_id);

    let empty = AxumTestRequest::post("/api/v1/coaching/chat")
        .auth(&token)
        .json(&json!({"message": "  "}))
        .send(build_router(resources))
        .await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn test_coaching_chat_stream_events() {
    let (resources, _, token) = setup(vec![
        ScriptedTurn::Calls(vec![("get_active_injuries".to_owned(), json!({}))]),
        ScriptedTurn::Text("No injuries, go run.".to_owned()),
    ])
    .await;

    let events = AxumTestRequest::post("/api/v1/coaching/chat/stream")
        .auth(&token)
        .json(&json!({"message": "Am I cleared to run?"}))
        .send_sse(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .sse_events();

    assert_eq!(events[0]["type"], "tool_start");
    assert_eq!(events[0]["tool"], "get_active_injuries");
    assert_eq!(events[1]["type"], "tool_end");
    let text: String = events
        .iter()
        .filter(|e| e["type"] == "token")
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(text, "No injuries, go run.");
    let last = events.last().unwrap();
    assert_eq!(last["type"], "done");
    assert!(last["session_id"].is_string());
}

#[tokio::test]
async fn test_health_sync_batches_and_status() {
    let (resources, user_id, token) = setup(Vec::new()).await;

    let rejected = AxumTestRequest::post("/api/v1/health/heart-rate/batch")
        .auth(&token)
        .json(&json!({
            "provider": "apple_health",
            "samples": [{"captured_at": "2025-03-14T08:00:00Z", "bpm": 20}],
        }))
        .send(build_router(resources.clone()))
        .await;
    assert_eq!(rejected.status(), 400);

    let stored: Value = AxumTestRequest::post("/api/v1/health/vo2max/batch")
        .auth(&token)
        .json(&json!({
            "provider": "apple_health",
            "samples": [
                {"measured_at": "2025-03-10T08:00:00Z", "ml_per_kg_min": 44.5, "source_record_id": "v-1"},
                {"measured_at": "2025-03-10T08:00:00Z", "ml_per_kg_min": 44.5, "source_record_id": "v-1"}
            ],
        }))
        .send(build_router(resources.clone()))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(stored["success"], true);
    assert_eq!(stored["data"]["total_received"], 2);
    assert_eq!(stored["data"]["total_stored"], 1);
    assert_eq!(stored["data"]["duplicates_skipped"], 1);

    let status: Value = AxumTestRequest::get("/api/v1/health/sync-status")
        .auth(&token)
        .send(build_router(resources))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(status["user_id"], user_id.as_str());
    let vo2 = status["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["kind"] == "vo2max")
        .unwrap();
    assert_eq!(vo2["record_count"], 1);
}
