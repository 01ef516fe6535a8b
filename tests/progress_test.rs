// ABOUTME: Integration tests for the progress dashboard built from stored plans and health data
// ABOUTME: Covers weekly windows, streaks, personal records, the VO2max trend and open injuries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::{create_test_database, create_test_user, noon, vo2, workout};
use strideiq_server::coaching::ProgressService;
use strideiq_server::database::Database;
use strideiq_server::models::{
    InjurySeverity, InjuryStatus, NewInjury, RecommendationDraft, RecommendationStatus,
    RecommendationUpdate,
};

fn draft(training: &str) -> RecommendationDraft {
    RecommendationDraft {
        todays_training: training.to_owned(),
        nutrition_fueling: "Carbs before, protein after.".to_owned(),
        recovery_protocol: "Foam roll calves.".to_owned(),
        reasoning: "Consistency builds the base.".to_owned(),
    }
}

async fn plan_on(
    database: &Database,
    user_id: &str,
    day: NaiveDate,
    training: &str,
    status: RecommendationStatus,
) {
    let store = database.recommendations();
    let saved = store
        .create_for_day(user_id, &draft(training), day, noon(day))
        .await
        .unwrap();
    if status != RecommendationStatus::Pending {
        store
            .update(&saved.id, user_id, &RecommendationUpdate::status(status, None))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_weekly_stats_streak_and_records() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let today = Utc::now().date_naive();
    let days_ago = |n: i64| today - Duration::days(n);

    for (offset, status) in [
        (0, RecommendationStatus::Completed),
        (1, RecommendationStatus::Completed),
        (2, RecommendationStatus::Completed),
        (4, RecommendationStatus::Skipped),
        (10, RecommendationStatus::Completed),
    ] {
        plan_on(&database, &user_id, days_ago(offset), "30-min easy run", status).await;
    }
    database
        .health_data()
        .insert_workouts(&[
            workout(&user_id, "run", noon(days_ago(0)), 30),
            workout(&user_id, "Running", noon(days_ago(1)), 50),
            workout(&user_id, "walk", noon(days_ago(10)), 20),
        ])
        .await
        .unwrap();

    let report = ProgressService::new(database.clone())
        .report_on(&user_id, today)
        .await
        .unwrap();

    let week = &report.current_week;
    assert_eq!(week.week_start, days_ago(6));
    assert_eq!(week.total_workouts, 4);
    assert_eq!(week.completed_workouts, 3);
    assert!((week.compliance_rate - 75.0).abs() < 1e-9);
    assert!((week.total_distance_miles - 8.0).abs() < 1e-9);
    assert_eq!(week.total_duration_minutes, 80);
    assert_eq!(week.avg_heart_rate, Some(142));

    assert_eq!(report.last_4_weeks.len(), 4);
    assert_eq!(report.last_4_weeks[0], report.current_week);
    let previous = &report.last_4_weeks[1];
    assert_eq!(previous.week_end, days_ago(7));
    assert_eq!(previous.total_workouts, 1);
    assert!((previous.compliance_rate - 100.0).abs() < 1e-9);
    assert!((previous.total_distance_miles - 2.0).abs() < 1e-9);
    assert_eq!(report.last_4_weeks[3].total_workouts, 0);

    assert_eq!(report.current_streak_days, 3);
    assert_eq!(report.total_workouts_all_time, 4);
    assert!((report.longest_run_miles - 5.0).abs() < 1e-9);

    let recent_days: Vec<NaiveDate> = report.recent_workouts.iter().map(|w| w.date).collect();
    assert_eq!(
        recent_days,
        vec![days_ago(0), days_ago(1), days_ago(2), days_ago(4)]
    );
    assert_eq!(report.recent_workouts[0].workout_type, "run");
    assert_eq!(report.recent_workouts[0].duration_minutes, 30);
    assert_eq!(report.recent_workouts[0].distance_miles, Some(3.0));
    assert_eq!(report.recent_workouts[2].distance_miles, None);
    assert_eq!(report.recent_workouts[3].status, RecommendationStatus::Skipped);
}

#[tokio::test]
async fn test_vo2_trend_and_open_injuries() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;
    let now = Utc::now();

    database
        .health_data()
        .insert_vo2max_estimates(&[
            vo2(&user_id, now - Duration::days(40), 50.0),
            vo2(&user_id, now - Duration::days(10), 45.04),
            vo2(&user_id, now - Duration::days(2), 46.26),
        ])
        .await
        .unwrap();
    database
        .injuries()
        .report(
            &user_id,
            &NewInjury {
                injury_type: "plantar_fasciitis".to_owned(),
                affected_area: "right_heel".to_owned(),
                severity_level: InjurySeverity::Mild,
                pain_level: 4,
                description: "Heel pain on the first steps of the morning".to_owned(),
                injury_date: Some(now.date_naive() - Duration::days(3)),
                symptoms: None,
                treatment_plan: None,
            },
        )
        .await
        .unwrap();

    let report = ProgressService::new(database.clone())
        .report(&user_id)
        .await
        .unwrap();

    let trend: Vec<f64> = report.vo2_trend.iter().map(|point| point.vo2_max).collect();
    assert_eq!(trend, vec![45.0, 46.3]);
    assert_eq!(report.best_vo2_max, Some(50.0));

    assert_eq!(report.active_injuries.len(), 1);
    let injury = &report.active_injuries[0];
    assert_eq!(injury.affected_area, "right_heel");
    assert_eq!(injury.pain_level, Some(4));
    assert_eq!(injury.days_since_injury, 3);
    assert_eq!(injury.status, InjuryStatus::Active);
}

#[tokio::test]
async fn test_new_user_gets_an_empty_report() {
    let database = create_test_database().await;
    let user_id = create_test_user(&database).await;

    let report = ProgressService::new(database.clone())
        .report(&user_id)
        .await
        .unwrap();

    assert_eq!(report.current_week.total_workouts, 0);
    assert!(report.current_week.compliance_rate.abs() < f64::EPSILON);
    assert_eq!(report.last_4_weeks.len(), 4);
    assert!(report.vo2_trend.is_empty());
    assert!(report.recent_workouts.is_empty());
    assert!(report.active_injuries.is_empty());
    assert!(report.longest_run_miles.abs() < f64::EPSILON);
    assert_eq!(report.best_vo2_max, None);
    assert_eq!(report.total_workouts_all_time, 0);
    assert_eq!(report.current_streak_days, 0);
}
