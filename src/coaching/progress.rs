// ABOUTME: Read-only progress dashboard: weekly compliance, VO2max trend, recent plans and records
// ABOUTME: Loads each window once and folds it into per-week stats with pure helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Progress
//!
//! [`ProgressService::report`] summarizes how a user has followed their plans:
//! the current week, the four trailing weeks, the last month of VO2max, the
//! last week of plans, open injuries and a handful of personal records.
//! Weeks are seven UTC calendar days ending on the reference day.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use super::trends::compliance_rate;
use crate::constants::progress::{STREAK_LOOKBACK, TRAILING_WEEKS, VO2_TREND_DAYS, WEEK_DAYS};
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{
    CoachingRecommendation, InjuryStatus, RecommendationStatus, UserInjury, WorkoutSession,
    WorkoutType,
};

/// Plan and workout totals for one seven-day window
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyStats {
    /// First day of the window
    pub week_start: NaiveDate,
    /// Last day of the window
    pub week_end: NaiveDate,
    /// Plans issued in the window
    pub total_workouts: usize,
    /// Plans marked completed
    pub completed_workouts: usize,
    /// Completed share of plans, one decimal
    pub compliance_rate: f64,
    /// Logged workout distance, two decimals
    pub total_distance_miles: f64,
    /// Logged workout time in whole minutes
    pub total_duration_minutes: i64,
    /// Mean of per-workout average heart rates
    pub avg_heart_rate: Option<u32>,
}

/// One VO2max reading on the trend line
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Vo2Point {
    /// When it was measured
    pub date: DateTime<Utc>,
    /// Value, one decimal
    pub vo2_max: f64,
}

/// A recent plan and what became of it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentWorkout {
    /// Plan day
    pub date: NaiveDate,
    /// Planned category or `unknown`
    pub workout_type: String,
    /// Planned minutes, 0 when not extracted
    pub duration_minutes: u32,
    /// Distance of the first logged workout that day, for distance sports
    pub distance_miles: Option<f64>,
    /// Compliance status
    pub status: RecommendationStatus,
}

/// Open injury as shown on the dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InjurySummary {
    /// e.g. `shin_splints`
    pub injury_type: String,
    /// e.g. `left_knee`
    pub affected_area: String,
    /// Current pain, falling back to the pain at report time
    pub pain_level: Option<u8>,
    /// Days since the injury happened
    pub days_since_injury: i64,
    /// Active or recovering
    pub status: InjuryStatus,
}

impl InjurySummary {
    fn from_injury(injury: &UserInjury, today: NaiveDate) -> Self {
        Self {
            injury_type: injury.injury_type.clone(),
            affected_area: injury.affected_area.clone(),
            pain_level: injury.current_pain_level.or(injury.initial_pain_level),
            days_since_injury: injury.days_since_injury(today),
            status: injury.status,
        }
    }
}

/// Everything `GET /api/v1/progress` returns
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressReport {
    /// Reference day the windows end on
    pub as_of: NaiveDate,
    /// The seven days ending today
    pub current_week: WeeklyStats,
    /// Four consecutive weeks, newest first; the first equals `current_week`
    pub last_4_weeks: Vec<WeeklyStats>,
    /// Last 30 days of VO2max, oldest first
    pub vo2_trend: Vec<Vo2Point>,
    /// Plans of the last seven days, newest first
    pub recent_workouts: Vec<RecentWorkout>,
    /// Active and recovering injuries
    pub active_injuries: Vec<InjurySummary>,
    /// Longest logged run, two decimals, 0 when none
    pub longest_run_miles: f64,
    /// Highest VO2max on record, one decimal
    pub best_vo2_max: Option<f64>,
    /// Completed plans over all time
    pub total_workouts_all_time: i64,
    /// Consecutive completed days ending today
    pub current_streak_days: u32,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

fn start_of(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Fold the plans and workouts falling on `start..=end` into one week
#[must_use]
pub fn week_stats(
    plans: &[CoachingRecommendation],
    workouts: &[WorkoutSession],
    start: NaiveDate,
    end: NaiveDate,
) -> WeeklyStats {
    let in_week = |day: NaiveDate| (start..=end).contains(&day);

    let week_plans: Vec<&CoachingRecommendation> = plans
        .iter()
        .filter(|plan| in_week(plan.recommendation_day))
        .collect();
    let completed = week_plans
        .iter()
        .filter(|plan| plan.status == RecommendationStatus::Completed)
        .count();

    let week_workouts: Vec<&WorkoutSession> = workouts
        .iter()
        .filter(|workout| in_week(workout.start_time.date_naive()))
        .collect();
    let distance: f64 = week_workouts.iter().filter_map(|w| w.distance_miles).sum();
    let seconds: i64 = week_workouts.iter().map(|w| w.duration_seconds).sum();
    let heart_rates: Vec<u32> = week_workouts.iter().filter_map(|w| w.avg_heart_rate).collect();
    let avg_heart_rate = if heart_rates.is_empty() {
        None
    } else {
        Some(heart_rates.iter().sum::<u32>() / heart_rates.len() as u32)
    };

    WeeklyStats {
        week_start: start,
        week_end: end,
        total_workouts: week_plans.len(),
        completed_workouts: completed,
        compliance_rate: round_to(compliance_rate(completed, week_plans.len()), 1),
        total_distance_miles: round_to(distance, 2),
        total_duration_minutes: seconds / 60,
        avg_heart_rate,
    }
}

/// Consecutive days ending on `today` found in `completed_days` (newest first)
///
/// A day without a completed plan breaks the streak, today included.
#[must_use]
pub fn current_streak(completed_days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut expected = today;
    let mut streak = 0;
    for day in completed_days {
        if *day > expected {
            continue;
        }
        if *day < expected {
            break;
        }
        streak += 1;
        expected -= Duration::days(1);
    }
    streak
}

fn recent_workout(plan: &CoachingRecommendation, workouts: &[WorkoutSession]) -> RecentWorkout {
    let distance_miles = match plan.workout_type {
        Some(WorkoutType::Run | WorkoutType::Walk | WorkoutType::Cycling) => workouts
            .iter()
            .find(|workout| workout.start_time.date_naive() == plan.recommendation_day)
            .and_then(|workout| workout.distance_miles),
        _ => None,
    };
    RecentWorkout {
        date: plan.recommendation_day,
        workout_type: plan
            .workout_type
            .map_or_else(|| "unknown".to_owned(), |kind| kind.as_str().to_owned()),
        duration_minutes: plan.duration_minutes.unwrap_or(0),
        distance_miles,
        status: plan.status,
    }
}

/// Builds [`ProgressReport`]s from stored plans and health data
#[derive(Clone)]
pub struct ProgressService {
    database: Database,
}

impl ProgressService {
    /// Create the service over a database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Progress as of the current UTC day
    ///
    /// # Errors
    ///
    /// Returns an error if any database read fails
    pub async fn report(&self, user_id: &str) -> AppResult<ProgressReport> {
        self.report_on(user_id, Utc::now().date_naive()).await
    }

    /// Progress with every window ending on `today`
    ///
    /// # Errors
    ///
    /// Returns an error if any database read fails
    pub async fn report_on(&self, user_id: &str, today: NaiveDate) -> AppResult<ProgressReport> {
        let oldest_day = today - Duration::days(WEEK_DAYS * TRAILING_WEEKS - 1);
        let window_start = start_of(oldest_day).unwrap_or_else(Utc::now);
        let window_end = start_of(today + Duration::days(1)).unwrap_or_else(Utc::now);

        let recommendations = self.database.recommendations();
        let health = self.database.health_data();

        let plans = recommendations
            .list_between_days(user_id, oldest_day, today)
            .await?;
        let workouts = health
            .workouts_between(user_id, window_start, window_end)
            .await?;

        let last_4_weeks: Vec<WeeklyStats> = (0..TRAILING_WEEKS)
            .map(|week| {
                let end = today - Duration::days(WEEK_DAYS * week);
                week_stats(&plans, &workouts, end - Duration::days(WEEK_DAYS - 1), end)
            })
            .collect();
        let current_week = week_stats(
            &plans,
            &workouts,
            today - Duration::days(WEEK_DAYS - 1),
            today,
        );

        let vo2_since = start_of(today - Duration::days(VO2_TREND_DAYS)).unwrap_or_else(Utc::now);
        let vo2_trend = health
            .vo2max_since(user_id, vo2_since)
            .await?
            .into_iter()
            .map(|reading| Vo2Point {
                date: reading.measured_at,
                vo2_max: round_to(reading.ml_per_kg_min, 1),
            })
            .collect();

        let recent_from = today - Duration::days(WEEK_DAYS - 1);
        let recent_workouts = plans
            .iter()
            .filter(|plan| plan.recommendation_day >= recent_from)
            .map(|plan| recent_workout(plan, &workouts))
            .collect();

        let active_injuries = self
            .database
            .injuries()
            .list_active(user_id, true)
            .await?
            .iter()
            .map(|injury| InjurySummary::from_injury(injury, today))
            .collect();

        let longest_run_miles = health
            .longest_run_miles(user_id)
            .await?
            .map_or(0.0, |miles| round_to(miles, 2));
        let best_vo2_max = health
            .best_vo2max(user_id)
            .await?
            .map(|best| round_to(best, 1));
        let total_workouts_all_time = recommendations.completed_count(user_id).await?;
        let completed_days = recommendations
            .completed_days(user_id, STREAK_LOOKBACK)
            .await?;
        let current_streak_days = current_streak(&completed_days, today);

        debug!(
            user_id = %user_id,
            plans = plans.len(),
            workouts = workouts.len(),
            streak = current_streak_days,
            "Progress report built"
        );

        Ok(ProgressReport {
            as_of: today,
            current_week,
            last_4_weeks,
            vo2_trend,
            recent_workouts,
            active_injuries,
            longest_run_miles,
            best_vo2_max,
            total_workouts_all_time,
            current_streak_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 20).unwrap_or_default() - Duration::days(offset)
    }

    fn plan(on: NaiveDate, status: RecommendationStatus) -> CoachingRecommendation {
        let at = start_of(on).unwrap_or_else(Utc::now);
        CoachingRecommendation {
            id: format!("plan-{on}"),
            user_id: "user-1".to_owned(),
            recommendation_date: at,
            recommendation_day: on,
            todays_training: "Easy 30 min run".to_owned(),
            nutrition_fueling: String::new(),
            recovery_protocol: String::new(),
            reasoning: String::new(),
            workout_type: Some(WorkoutType::Run),
            duration_minutes: Some(30),
            intensity_zone: None,
            heart_rate_range: None,
            status,
            actual_workout_id: None,
            compliance_notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn session(on: NaiveDate, minutes: i64, miles: Option<f64>, bpm: Option<u32>) -> WorkoutSession {
        let start = start_of(on).unwrap_or_else(Utc::now) + Duration::hours(7);
        WorkoutSession {
            id: format!("w-{on}-{minutes}"),
            user_id: "user-1".to_owned(),
            provider: "apple_health".to_owned(),
            source_record_id: None,
            activity_type: "Running".to_owned(),
            start_time: start,
            end_time: None,
            duration_seconds: minutes * 60,
            calories: None,
            distance_miles: miles,
            avg_heart_rate: bpm,
            max_heart_rate: None,
        }
    }

    #[test]
    fn test_week_stats_only_counts_days_inside_the_window() {
        let plans = vec![
            plan(day(0), RecommendationStatus::Completed),
            plan(day(2), RecommendationStatus::Skipped),
            plan(day(6), RecommendationStatus::Completed),
            plan(day(7), RecommendationStatus::Completed),
        ];
        let workouts = vec![
            session(day(0), 31, Some(3.114), Some(140)),
            session(day(6), 45, Some(4.5), Some(151)),
            session(day(7), 60, Some(6.0), Some(170)),
        ];

        let stats = week_stats(&plans, &workouts, day(6), day(0));
        assert_eq!(stats.total_workouts, 3);
        assert_eq!(stats.completed_workouts, 2);
        assert!((stats.compliance_rate - 66.7).abs() < 1e-9);
        assert!((stats.total_distance_miles - 7.61).abs() < 1e-9);
        assert_eq!(stats.total_duration_minutes, 76);
        assert_eq!(stats.avg_heart_rate, Some(145));
    }

    #[test]
    fn test_empty_week_is_all_zero() {
        let stats = week_stats(&[], &[], day(6), day(0));
        assert_eq!(stats.total_workouts, 0);
        assert!(stats.compliance_rate.abs() < f64::EPSILON);
        assert!(stats.total_distance_miles.abs() < f64::EPSILON);
        assert_eq!(stats.avg_heart_rate, None);
    }

    #[test]
    fn test_streak_counts_back_from_today() {
        let days = vec![day(0), day(1), day(2), day(4), day(5)];
        assert_eq!(current_streak(&days, day(0)), 3);
    }

    #[test]
    fn test_streak_needs_today() {
        let days = vec![day(1), day(2)];
        assert_eq!(current_streak(&days, day(0)), 0);
        assert_eq!(current_streak(&[], day(0)), 0);
    }

    #[test]
    fn test_recent_workout_distance_only_for_distance_sports() {
        let workouts = vec![session(day(1), 30, Some(3.2), None)];
        let run = recent_workout(&plan(day(1), RecommendationStatus::Completed), &workouts);
        assert_eq!(run.distance_miles, Some(3.2));
        assert_eq!(run.workout_type, "run");

        let mut rest = plan(day(1), RecommendationStatus::Pending);
        rest.workout_type = None;
        rest.duration_minutes = None;
        let rest = recent_workout(&rest, &workouts);
        assert_eq!(rest.workout_type, "unknown");
        assert_eq!(rest.duration_minutes, 0);
        assert_eq!(rest.distance_miles, None);
    }
}
