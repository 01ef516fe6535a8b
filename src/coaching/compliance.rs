// ABOUTME: Decides whether a prescribed daily plan was completed, partially done or skipped
// ABOUTME: Pure matcher over logged workouts plus the once-per-day check of yesterday's pending plan
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::constants::recommendations::DURATION_TOLERANCE;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{CoachingRecommendation, RecommendationStatus, WorkoutSession, WorkoutType};

/// Workouts listed in a "different workout" note
const MAX_LISTED_WORKOUTS: usize = 2;

/// Result of matching one plan against a day's workouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceOutcome {
    /// Completed, partial or skipped
    pub status: RecommendationStatus,
    /// Human-readable explanation
    pub notes: String,
    /// Workout that satisfied the plan
    pub matched_workout_id: Option<String>,
}

/// Match a plan against the workouts logged on its day
///
/// A workout matching both type and duration wins wherever it appears. Failing
/// that, the first workout matching either dimension gives a partial.
///
/// This is deliberately not a single first-match scan: a scan would stop at an
/// earlier workout that matches only one dimension (a warm-up walk logged before
/// the planned run) and grade a fully done plan as partial.
#[must_use]
pub fn evaluate(
    recommendation: &CoachingRecommendation,
    workouts: &[WorkoutSession],
) -> ComplianceOutcome {
    evaluate_plan(
        recommendation.workout_type,
        recommendation.duration_minutes,
        workouts,
    )
}

/// [`evaluate`] over the plan's extracted fields
#[must_use]
pub fn evaluate_plan(
    planned_type: Option<WorkoutType>,
    planned_minutes: Option<u32>,
    workouts: &[WorkoutSession],
) -> ComplianceOutcome {
    if workouts.is_empty() {
        return ComplianceOutcome {
            status: RecommendationStatus::Skipped,
            notes: "No workouts logged for this day".to_owned(),
            matched_workout_id: None,
        };
    }

    let scored: Vec<(&WorkoutSession, bool, bool)> = workouts
        .iter()
        .map(|w| {
            (
                w,
                type_matches(planned_type, &w.activity_type),
                duration_matches(planned_minutes, w.duration_minutes()),
            )
        })
        .collect();

    if let Some((workout, _, _)) = scored.iter().find(|(_, t, d)| *t && *d) {
        return ComplianceOutcome {
            status: RecommendationStatus::Completed,
            notes: format!(
                "Completed: {}, {:.0} min",
                workout.activity_type,
                workout.duration_minutes()
            ),
            matched_workout_id: Some(workout.id.clone()),
        };
    }

    if let Some((workout, _, _)) = scored.iter().find(|(_, t, d)| *t || *d) {
        return ComplianceOutcome {
            status: RecommendationStatus::Partial,
            notes: format!(
                "Partial: Did {}, {:.0} min instead of {}, {} min",
                workout.activity_type,
                workout.duration_minutes(),
                planned_type.map_or("unspecified", |t| t.as_str()),
                planned_minutes.map_or_else(|| "?".to_owned(), |m| m.to_string()),
            ),
            matched_workout_id: Some(workout.id.clone()),
        };
    }

    let listed: Vec<String> = workouts
        .iter()
        .take(MAX_LISTED_WORKOUTS)
        .map(|w| format!("{} ({:.0} min)", w.activity_type, w.duration_minutes()))
        .collect();
    ComplianceOutcome {
        status: RecommendationStatus::Partial,
        notes: format!("Did different workout: {}", listed.join(", ")),
        matched_workout_id: None,
    }
}

/// Case-insensitive substring match in either direction
fn type_matches(planned: Option<WorkoutType>, activity_type: &str) -> bool {
    let Some(planned) = planned else {
        return false;
    };
    let actual = activity_type.trim().to_lowercase();
    if actual.is_empty() {
        return false;
    }
    let planned = planned.as_str();
    actual.contains(planned) || planned.contains(actual.as_str())
}

/// Within 20% of the planned duration
fn duration_matches(planned: Option<u32>, actual_minutes: f64) -> bool {
    match planned {
        Some(minutes) if minutes > 0 => {
            let planned = f64::from(minutes);
            (actual_minutes - planned).abs() <= planned * DURATION_TOLERANCE
        }
        _ => false,
    }
}

// ============================================================================
// Daily check
// ============================================================================

/// Outcome of the once-per-day compliance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceCheck {
    /// Whether a pending plan was evaluated
    pub checked: bool,
    /// Evaluated plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecommendationStatus>,
    /// Match notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Why nothing was checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComplianceCheck {
    fn skipped(message: &str) -> Self {
        Self {
            checked: false,
            recommendation_id: None,
            status: None,
            notes: None,
            message: Some(message.to_owned()),
        }
    }
}

/// Applies compliance decisions to stored plans
#[derive(Clone)]
pub struct ComplianceChecker {
    database: Database,
}

impl ComplianceChecker {
    /// Create a checker over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Check yesterday's (UTC) pending plan
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn check_yesterday(&self, user_id: &str) -> AppResult<ComplianceCheck> {
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        self.check_day(user_id, yesterday).await
    }

    /// Check the pending plan for `day`, if one exists
    ///
    /// Plans already in a terminal status are never re-evaluated.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn check_day(&self, user_id: &str, day: NaiveDate) -> AppResult<ComplianceCheck> {
        let recommendations = self.database.recommendations();
        let Some(recommendation) = recommendations.find_pending_for_day(user_id, day).await?
        else {
            return Ok(ComplianceCheck::skipped(
                "No pending recommendation from yesterday",
            ));
        };

        let Some(from) = day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()) else {
            return Ok(ComplianceCheck::skipped("Invalid recommendation day"));
        };
        let workouts = self
            .database
            .health_data()
            .workouts_between(user_id, from, from + Duration::days(1))
            .await?;

        let outcome = evaluate(&recommendation, &workouts);
        let applied = recommendations
            .apply_compliance(
                &recommendation.id,
                outcome.status,
                &outcome.notes,
                outcome.matched_workout_id.as_deref(),
            )
            .await?;

        if !applied {
            return Ok(ComplianceCheck::skipped(
                "No pending recommendation from yesterday",
            ));
        }

        info!(
            user_id = %user_id,
            recommendation_id = %recommendation.id,
            status = %outcome.status,
            workouts = workouts.len(),
            "Compliance check applied"
        );

        Ok(ComplianceCheck {
            checked: true,
            recommendation_id: Some(recommendation.id),
            status: Some(outcome.status),
            notes: Some(outcome.notes),
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn workout(id: &str, activity: &str, minutes: i64) -> WorkoutSession {
        WorkoutSession {
            id: id.to_owned(),
            user_id: "u1".to_owned(),
            provider: "apple_health".to_owned(),
            source_record_id: None,
            activity_type: activity.to_owned(),
            start_time: Utc.with_ymd_and_hms(2025, 3, 13, 7, 0, 0).unwrap(),
            end_time: None,
            duration_seconds: minutes * 60,
            calories: None,
            distance_miles: None,
            avg_heart_rate: None,
            max_heart_rate: None,
        }
    }

    #[test]
    fn test_no_workouts_is_skipped() {
        let outcome = evaluate_plan(Some(WorkoutType::Run), Some(30), &[]);
        assert_eq!(outcome.status, RecommendationStatus::Skipped);
        assert_eq!(outcome.notes, "No workouts logged for this day");
        assert!(outcome.matched_workout_id.is_none());
    }

    #[test]
    fn test_type_and_duration_within_tolerance_completes() {
        let outcome = evaluate_plan(
            Some(WorkoutType::Run),
            Some(30),
            &[workout("w1", "Running", 32)],
        );
        assert_eq!(outcome.status, RecommendationStatus::Completed);
        assert_eq!(outcome.notes, "Completed: Running, 32 min");
        assert_eq!(outcome.matched_workout_id.as_deref(), Some("w1"));
    }

    #[test]
    fn test_type_only_is_partial() {
        let outcome = evaluate_plan(
            Some(WorkoutType::Run),
            Some(30),
            &[workout("w1", "running", 10)],
        );
        assert_eq!(outcome.status, RecommendationStatus::Partial);
        assert_eq!(
            outcome.notes,
            "Partial: Did running, 10 min instead of run, 30 min"
        );
        assert_eq!(outcome.matched_workout_id.as_deref(), Some("w1"));
    }

    #[test]
    fn test_full_match_later_in_day_beats_earlier_partial() {
        let outcome = evaluate_plan(
            Some(WorkoutType::Walk),
            Some(30),
            &[workout("w1", "walking", 5), workout("w2", "walking", 28)],
        );
        assert_eq!(outcome.status, RecommendationStatus::Completed);
        assert_eq!(outcome.matched_workout_id.as_deref(), Some("w2"));
    }

    #[test]
    fn test_unrelated_workouts_are_listed() {
        let outcome = evaluate_plan(
            Some(WorkoutType::Run),
            Some(30),
            &[
                workout("w1", "yoga", 60),
                workout("w2", "swimming", 45),
                workout("w3", "rowing", 20),
            ],
        );
        assert_eq!(outcome.status, RecommendationStatus::Partial);
        assert_eq!(
            outcome.notes,
            "Did different workout: yoga (60 min), swimming (45 min)"
        );
        assert!(outcome.matched_workout_id.is_none());
    }

    #[test]
    fn test_empty_activity_type_never_matches() {
        assert!(!type_matches(Some(WorkoutType::Run), "  "));
        assert!(!type_matches(None, "running"));
        assert!(type_matches(Some(WorkoutType::Cycling), "Cycling"));
        assert!(!duration_matches(None, 30.0));
        assert!(duration_matches(Some(30), 36.0));
        assert!(!duration_matches(Some(30), 36.5));
    }
}
