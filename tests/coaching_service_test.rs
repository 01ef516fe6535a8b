// ABOUTME: Integration tests for the recommendation pipeline over scripted language models
// ABOUTME: Covers blocking and streamed generation, fallback plans and manual status updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    create_test_database, create_test_user, vo2, FailingLlmProvider, ScriptedLlmProvider,
    TEST_MODEL,
};
use strideiq_server::coaching::{CoachingService, ContextAggregator, RecommendationStreamEvent};
use strideiq_server::errors::ErrorCode;
use strideiq_server::llm::LlmProvider;
use strideiq_server::models::{RecommendationStatus, WorkoutType};
use tokio_stream::StreamExt;
use uuid::Uuid;

#[tokio::test]
async fn test_generate_persists_model_plan() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let llm = Arc::new(ScriptedLlmProvider::with_plan());
    let service = CoachingService::new(database.clone(), llm.clone(), TEST_MODEL);

    let body = service.generate_recommendations(&user_id).await.unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 4);
    assert_eq!(body["recommendations"][0]["title"], "Today's Workout");
    assert!(body["ai_insights"]["todays_training"]
        .as_str()
        .unwrap()
        .contains("45-minute easy run"));
    assert_eq!(body["context_summary"]["has_profile"], true);
    assert_eq!(body["compliance_check"]["checked"], false);

    let saved = database.recommendations().latest(&user_id).await.unwrap().unwrap();
    assert_eq!(saved.id, body["recommendation_id"].as_str().unwrap());
    assert_eq!(saved.workout_type, Some(WorkoutType::Run));
    assert_eq!(saved.duration_minutes, Some(45));
    assert_eq!(saved.heart_rate_range.as_deref(), Some("130-145"));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model.as_deref(), Some(TEST_MODEL));
    assert!(requests[0].response_format.is_some());
    assert!(!requests[0].stream);
}

#[tokio::test]
async fn test_provider_failure_yields_partial_success() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let service = CoachingService::new(database.clone(), Arc::new(FailingLlmProvider), TEST_MODEL);

    let body = service.generate_recommendations(&user_id).await.unwrap();

    assert_eq!(body["status"], "partial_success");
    assert!(!body["ai_insights"]["todays_training"]
        .as_str()
        .unwrap()
        .is_empty());
    assert!(database
        .recommendations()
        .latest(&user_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_stream_emits_events_in_order() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let service = CoachingService::new(
        database.clone(),
        Arc::new(ScriptedLlmProvider::with_plan()),
        TEST_MODEL,
    );

    let events: Vec<RecommendationStreamEvent> =
        service.stream_recommendations(&user_id).collect().await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|event| match event {
            RecommendationStreamEvent::Status { .. } => "status",
            RecommendationStreamEvent::Context { .. } => "context",
            RecommendationStreamEvent::Chunk { .. } => "chunk",
            RecommendationStreamEvent::Complete { .. } => "complete",
            RecommendationStreamEvent::Error { .. } => "error",
            RecommendationStreamEvent::Done => "done",
        })
        .collect();
    assert_eq!(
        kinds,
        ["status", "context", "status", "chunk", "chunk", "complete", "done"]
    );

    let Some(RecommendationStreamEvent::Complete {
        status,
        recommendation_id,
        recommendations,
        ..
    }) = events.get(5)
    else {
        panic!("expected complete event");
    };
    assert_eq!(*status, "success");
    assert_eq!(recommendations.len(), 4);

    // The plan is stored before the complete event is emitted
    let saved = database.recommendations().latest(&user_id).await.unwrap().unwrap();
    assert_eq!(&saved.id, recommendation_id);
}

#[tokio::test]
async fn test_stream_with_failing_provider_still_completes() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let service = CoachingService::new(database.clone(), Arc::new(FailingLlmProvider), TEST_MODEL);

    let events: Vec<RecommendationStreamEvent> =
        service.stream_recommendations(&user_id).collect().await;

    assert!(events
        .iter()
        .all(|e| !matches!(e, RecommendationStreamEvent::Chunk { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        RecommendationStreamEvent::Complete {
            status: "partial_success",
            ..
        }
    )));
    assert!(matches!(events.last(), Some(RecommendationStreamEvent::Done)));
}

#[tokio::test]
async fn test_update_status_validation() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let service = CoachingService::new(
        database.clone(),
        Arc::new(ScriptedLlmProvider::with_plan()),
        TEST_MODEL,
    );
    service.generate_recommendations(&user_id).await.unwrap();
    let plan = service.latest(&user_id).await.unwrap().unwrap();

    let pending = service
        .update_status(&user_id, &plan.id, "pending", None)
        .await
        .unwrap_err();
    assert_eq!(pending.code, ErrorCode::InvalidInput);

    let unknown = service
        .update_status(&user_id, &plan.id, "finished", None)
        .await
        .unwrap_err();
    assert_eq!(unknown.code, ErrorCode::InvalidInput);

    let long_notes = service
        .update_status(&user_id, &plan.id, "completed", Some("x".repeat(501)))
        .await
        .unwrap_err();
    assert_eq!(long_notes.code, ErrorCode::InvalidInput);

    let updated = service
        .update_status(&user_id, &plan.id, "Partial", Some("Cut it short".to_owned()))
        .await
        .unwrap();
    assert_eq!(updated.status, RecommendationStatus::Partial);
    assert_eq!(updated.compliance_notes.as_deref(), Some("Cut it short"));
}

#[tokio::test]
async fn test_quick_actions_and_summary_for_seeded_user() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let service = CoachingService::new(
        database.clone(),
        Arc::new(ScriptedLlmProvider::with_plan()),
        TEST_MODEL,
    );

    let actions = service.quick_actions(&user_id).await;
    assert!(!actions.is_empty());
    assert!(actions.len() <= 4);

    let summary = service.data_summary(&user_id).await;
    assert_eq!(summary["has_profile"], true);
    assert_eq!(summary["data_availability"]["weight"], true);
    assert_eq!(summary["today_stats"]["workout_count"], 0);
    assert_eq!(summary["active_injuries"], 0);
}

#[tokio::test]
async fn test_brand_new_user_gets_a_full_plan() {
    let database = create_test_database().await;
    let newcomer = Uuid::new_v4().to_string();

    for llm in [
        Arc::new(FailingLlmProvider) as Arc<dyn LlmProvider>,
        Arc::new(ScriptedLlmProvider::with_plan()),
    ] {
        let service = CoachingService::new(database.clone(), llm, TEST_MODEL);
        let body = service.generate_recommendations(&newcomer).await.unwrap();

        let status = body["status"].as_str().unwrap();
        assert!(status == "success" || status == "partial_success");
        assert_eq!(body["context_summary"]["has_profile"], false);
        assert_eq!(body["recommendations"].as_array().unwrap().len(), 4);
        for field in [
            "todays_training",
            "nutrition_fueling",
            "recovery_protocol",
            "reasoning",
        ] {
            assert!(
                !body["ai_insights"][field].as_str().unwrap().trim().is_empty(),
                "{field} is empty for {status}"
            );
        }
    }

    let fallback = database
        .recommendations()
        .latest(&newcomer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fallback.status, RecommendationStatus::Pending);
}

#[tokio::test]
async fn test_failing_category_is_left_empty() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    database
        .health_data()
        .insert_vo2max_estimates(&[vo2(&user_id, Utc::now() - Duration::days(1), 44.0)])
        .await
        .unwrap();
    sqlx::query("DROP TABLE sleep_sessions")
        .execute(database.pool())
        .await
        .unwrap();

    let context = ContextAggregator::new(database.clone()).gather(&user_id).await;
    assert!(context.sleep.is_empty());
    assert!(context.profile.is_some());
    assert_eq!(context.today_stats.vo2_max, Some(44.0));

    let service = CoachingService::new(
        database.clone(),
        Arc::new(ScriptedLlmProvider::with_plan()),
        TEST_MODEL,
    );
    let body = service.generate_recommendations(&user_id).await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["context_summary"]["data_availability"]["sleep"], false);
    assert_eq!(body["context_summary"]["data_availability"]["vo2_max"], true);
}
