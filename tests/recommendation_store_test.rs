// ABOUTME: Integration tests for the coaching recommendation store
// ABOUTME: Covers per-day upsert, ownership checks, bounded listing and guarded compliance writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use common::{create_test_database, create_test_user, noon};
use strideiq_server::errors::ErrorCode;
use strideiq_server::models::{
    RecommendationDraft, RecommendationStatus, RecommendationUpdate, WorkoutDetails, WorkoutType,
};

fn draft(training: &str) -> RecommendationDraft {
    RecommendationDraft {
        todays_training: training.to_owned(),
        nutrition_fueling: "Oats before, eggs after.".to_owned(),
        recovery_protocol: "Sleep 8 hours.".to_owned(),
        reasoning: "Aerobic base first.".to_owned(),
    }
}

#[tokio::test]
async fn test_create_extracts_workout_fields() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;

    let saved = database
        .recommendations()
        .create(&user_id, &draft("30-min easy run, Zone 2 (140-150 BPM)"))
        .await
        .unwrap();

    assert_eq!(saved.status, RecommendationStatus::Pending);
    assert_eq!(saved.workout_type, Some(WorkoutType::Run));
    assert_eq!(saved.duration_minutes, Some(30));
    assert_eq!(saved.intensity_zone.as_deref(), Some("zone_2"));
    assert_eq!(saved.heart_rate_range.as_deref(), Some("140-150"));
    assert_eq!(saved.recommendation_day, Utc::now().date_naive());
}

#[tokio::test]
async fn test_second_plan_same_day_starts_over_as_pending() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let store = database.recommendations();

    let first = store
        .create(&user_id, &draft("30-min walk"))
        .await
        .unwrap();
    let graded = store
        .update(
            &first.id,
            &user_id,
            &RecommendationUpdate::status(RecommendationStatus::Completed, Some("did it".to_owned())),
        )
        .await
        .unwrap();
    assert_eq!(graded.status, RecommendationStatus::Completed);

    let second = store
        .create(&user_id, &draft("45-minute bike ride"))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.workout_type, Some(WorkoutType::Cycling));
    assert_eq!(second.duration_minutes, Some(45));
    assert_eq!(second.status, RecommendationStatus::Pending);
    assert!(second.compliance_notes.is_none());
    assert!(second.actual_workout_id.is_none());
    assert_eq!(store.list_recent(&user_id, 7).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_with_details_skips_text_extraction() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;

    let saved = database
        .recommendations()
        .create_with_details(
            &user_id,
            &draft("Easy 20 min walk around the park"),
            &WorkoutDetails {
                workout_type: Some(WorkoutType::Run),
                duration_minutes: Some(35),
                intensity_zone: Some("zone_2".to_owned()),
                heart_rate_range: Some("128-142".to_owned()),
            },
        )
        .await
        .unwrap();

    assert_eq!(saved.status, RecommendationStatus::Pending);
    assert_eq!(saved.todays_training, "Easy 20 min walk around the park");
    assert_eq!(saved.workout_type, Some(WorkoutType::Run));
    assert_eq!(saved.duration_minutes, Some(35));
    assert_eq!(saved.heart_rate_range.as_deref(), Some("128-142"));
}

#[tokio::test]
async fn test_get_today_is_a_pure_read() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let store = database.recommendations();

    assert!(store.get_today(&user_id).await.unwrap().is_none());
    assert!(store.get_today(&user_id).await.unwrap().is_none());

    store
        .create(&user_id, &draft("20-minute walk"))
        .await
        .unwrap();
    let first = store.get_today(&user_id).await.unwrap().unwrap();
    let second = store.get_today(&user_id).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(store.list_recent(&user_id, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_of_foreign_plan_is_not_found() {
    let database = create_test_database().await;
    let owner = create_test_user(&database).await;
    let stranger = create_test_user(&database).await;
    let store = database.recommendations();

    let plan = store.create(&owner, &draft("30-min run")).await.unwrap();
    let err = store
        .update(
            &plan.id,
            &stranger,
            &RecommendationUpdate::status(RecommendationStatus::Skipped, None),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ResourceNotFound);
    assert!(store.get_by_id(&plan.id, &stranger).await.unwrap().is_none());
    let untouched = store.get_by_id(&plan.id, &owner).await.unwrap().unwrap();
    assert_eq!(untouched.status, RecommendationStatus::Pending);
}

#[tokio::test]
async fn test_list_recent_is_newest_first_and_capped() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let store = database.recommendations();
    let today = Utc::now().date_naive();

    for offset in 0..12 {
        let day = today - Duration::days(offset);
        store
            .create_for_day(&user_id, &draft(&format!("{} min walk", 20 + offset)), day, noon(day))
            .await
            .unwrap();
    }

    let recent = store.list_recent(&user_id, 30).await.unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].recommendation_day, today);
    assert!(recent
        .windows(2)
        .all(|pair| pair[0].recommendation_date >= pair[1].recommendation_date));

    let short_window = store.list_recent(&user_id, 2).await.unwrap();
    assert!(short_window.len() <= 3);
}

#[tokio::test]
async fn test_apply_compliance_only_touches_pending_plans() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let store = database.recommendations();
    let yesterday = Utc::now().date_naive() - Duration::days(1);

    let plan = store
        .create_for_day(&user_id, &draft("30-min run"), yesterday, noon(yesterday))
        .await
        .unwrap();
    assert!(store
        .find_pending_for_day(&user_id, yesterday)
        .await
        .unwrap()
        .is_some());

    let applied = store
        .apply_compliance(&plan.id, RecommendationStatus::Skipped, "No workouts logged for this day", None)
        .await
        .unwrap();
    assert!(applied);

    let again = store
        .apply_compliance(&plan.id, RecommendationStatus::Completed, "late", None)
        .await
        .unwrap();
    assert!(!again);

    let stored = store.get_by_id(&plan.id, &user_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RecommendationStatus::Skipped);
    assert_eq!(
        stored.compliance_notes.as_deref(),
        Some("No workouts logged for this day")
    );
    assert!(store
        .find_pending_for_day(&user_id, yesterday)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_latest_is_empty_for_new_user() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    assert!(database
        .recommendations()
        .latest(&user_id)
        .await
        .unwrap()
        .is_none());
}
