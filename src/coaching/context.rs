// ABOUTME: Read-only aggregation of a user's fitness state into a bounded coaching context
// ABOUTME: Each data category loads independently; a failing category is logged and left empty
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Context Aggregator
//!
//! Builds a [`UserContext`] snapshot per request: profile, goals, preferences,
//! the newest few rows of every health series, today's live stats, injury
//! state and the last week of prior plans, plus derived [`Trends`].
//!
//! Missing data never fails aggregation. A brand-new user produces a context
//! where every field is empty and the generator still has enough to build a
//! fallback plan.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use super::trends::{ComplianceSummary, Trends};
use crate::constants::coaching_llm::{DEFAULT_AGE, DEFAULT_FIRST_NAME};
use crate::constants::context_windows::{
    HEART_RATE_SAMPLE_LIMIT, PRIOR_RECOMMENDATION_DAYS, PRIOR_RECOMMENDATION_LIMIT, RECENT_DAYS,
    RECENT_ROWS,
};
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{
    CoachingRecommendation, DailyIntention, HeartRateDay, HeartRateSample, MedicalCondition,
    RecommendationStatus, SleepSession, StepDay, TrainingPreferences, UserGoal, UserInjury,
    UserProfile, Vo2MaxEstimate, WeightMeasurement, WorkoutSession, WorkoutType,
};

/// Live numbers for the current UTC day
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TodayStats {
    /// Steps so far today
    pub steps: i64,
    /// Rounded average heart rate today
    pub avg_heart_rate: Option<u32>,
    /// Workouts started today
    pub workout_count: usize,
    /// Most recent VO2 max reading
    pub vo2_max: Option<f64>,
}

/// Compact view of a previous plan as shown to the model
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PriorRecommendation {
    /// Day the plan applied to
    pub date: NaiveDate,
    /// Extracted workout type
    pub workout_type: Option<WorkoutType>,
    /// Extracted duration
    pub duration_minutes: Option<u32>,
    /// Lifecycle status
    pub status: RecommendationStatus,
    /// Compliance notes
    pub compliance_notes: Option<String>,
}

impl From<&CoachingRecommendation> for PriorRecommendation {
    fn from(rec: &CoachingRecommendation) -> Self {
        Self {
            date: rec.recommendation_day,
            workout_type: rec.workout_type,
            duration_minutes: rec.duration_minutes,
            status: rec.status,
            compliance_notes: rec.compliance_notes.clone(),
        }
    }
}

/// Everything the generator knows about a user for one request
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserContext {
    /// Subject of the context
    pub user_id: String,
    /// Demographics
    pub profile: Option<UserProfile>,
    /// Active goals
    pub goals: Vec<UserGoal>,
    /// Training level and frequency
    pub training_preferences: Option<TrainingPreferences>,
    /// Newest weights first
    pub weight_history: Vec<WeightMeasurement>,
    /// Newest VO2 readings first
    pub vo2_history: Vec<Vo2MaxEstimate>,
    /// Daily heart-rate averages, newest day first
    pub heart_rate_days: Vec<HeartRateDay>,
    /// Newest workouts first
    pub workouts: Vec<WorkoutSession>,
    /// Daily step totals, newest day first
    pub step_days: Vec<StepDay>,
    /// Newest sleep sessions first
    pub sleep: Vec<SleepSession>,
    /// Today's training intention
    pub daily_intention: Option<DailyIntention>,
    /// Active medical conditions
    pub medical_conditions: Vec<MedicalCondition>,
    /// Active and recovering injuries
    pub active_injuries: Vec<UserInjury>,
    /// Plans from the last week, newest first
    pub previous_recommendations: Vec<PriorRecommendation>,
    /// Derived trends
    pub trends: Trends,
    /// Today's live numbers
    pub today_stats: TodayStats,
}

impl UserContext {
    /// An empty context for a user with no data
    #[must_use]
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            ..Self::default()
        }
    }

    /// Name used to address the athlete
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(UserProfile::display_name)
            .unwrap_or(DEFAULT_FIRST_NAME)
    }

    /// Age for heart-rate zone math, defaulting to 30
    #[must_use]
    pub fn age(&self) -> u32 {
        self.profile
            .as_ref()
            .and_then(|p| p.age)
            .unwrap_or(DEFAULT_AGE)
    }

    /// Newest weight measurement
    #[must_use]
    pub fn latest_weight(&self) -> Option<&WeightMeasurement> {
        self.weight_history.first()
    }

    /// Status tallies over the prior-plan window
    #[must_use]
    pub fn compliance(&self) -> ComplianceSummary {
        ComplianceSummary::from_statuses(self.previous_recommendations.iter().map(|r| r.status))
    }

    /// Recompute trends from the loaded series
    pub fn refresh_trends(&mut self) {
        let vo2: Vec<f64> = self.vo2_history.iter().map(|v| v.ml_per_kg_min).collect();
        let heart_rate: Vec<f64> = self.heart_rate_days.iter().map(|d| d.avg_bpm).collect();
        let weight: Vec<f64> = self.weight_history.iter().map(|w| w.value_lbs).collect();
        self.trends = Trends::calculate(&vo2, &heart_rate, &weight, self.workouts.len());
    }

    /// Summary of which data the plan was built from
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "has_profile": self.profile.is_some(),
            "demographics": {
                "age": self.profile.as_ref().and_then(|p| p.age),
                "gender": self.profile.as_ref().and_then(|p| p.gender.clone()),
                "height_inches": self.profile.as_ref().and_then(|p| p.height_inches),
            },
            "goals_count": self.goals.len(),
            "has_training_preferences": self.training_preferences.is_some(),
            "data_availability": {
                "weight": !self.weight_history.is_empty(),
                "vo2_max": !self.vo2_history.is_empty(),
                "heart_rate": !self.heart_rate_days.is_empty(),
                "sleep": !self.sleep.is_empty(),
                "workouts": !self.workouts.is_empty(),
                "steps": !self.step_days.is_empty(),
            },
        })
    }
}

/// Group heart-rate samples by UTC day and keep the newest `days` days
#[must_use]
pub fn heart_rate_daily_averages(samples: &[HeartRateSample], days: usize) -> Vec<HeartRateDay> {
    let mut by_day: BTreeMap<NaiveDate, Vec<u32>> = BTreeMap::new();
    for sample in samples {
        by_day
            .entry(sample.captured_at.date_naive())
            .or_default()
            .push(sample.bpm);
    }

    by_day
        .into_iter()
        .rev()
        .take(days)
        .filter_map(|(date, bpms)| {
            let min_bpm = *bpms.iter().min()?;
            let max_bpm = *bpms.iter().max()?;
            let total: u64 = bpms.iter().map(|b| u64::from(*b)).sum();
            Some(HeartRateDay {
                date,
                avg_bpm: total as f64 / bpms.len() as f64,
                min_bpm,
                max_bpm,
                samples: bpms.len(),
            })
        })
        .collect()
}

/// Loads a [`UserContext`] from the database
#[derive(Clone)]
pub struct ContextAggregator {
    database: Database,
}

impl ContextAggregator {
    /// Create an aggregator over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Gather the context for `user_id` as of now
    pub async fn gather(&self, user_id: &str) -> UserContext {
        self.gather_at(user_id, Utc::now()).await
    }

    /// Gather the context as of `now`
    ///
    /// Never fails: each category that errors is logged and left empty.
    pub async fn gather_at(&self, user_id: &str, now: DateTime<Utc>) -> UserContext {
        let profiles = self.database.profiles();
        let health = self.database.health_data();
        let today = now.date_naive();
        let start_of_today = today.and_hms_opt(0, 0, 0).map_or(now, |dt| dt.and_utc());
        let recent_since = now - Duration::days(RECENT_DAYS);

        let mut context = UserContext::empty(user_id);

        context.profile = load(user_id, "profile", profiles.get_profile(user_id)).await;
        context.goals = load(user_id, "goals", profiles.list_active_goals(user_id)).await;
        context.training_preferences = load(
            user_id,
            "training_preferences",
            profiles.get_training_preferences(user_id),
        )
        .await;
        context.weight_history = load(
            user_id,
            "weight",
            profiles.recent_weights(user_id, RECENT_ROWS),
        )
        .await;
        context.vo2_history =
            load(user_id, "vo2_max", health.recent_vo2max(user_id, RECENT_ROWS)).await;

        let hr_samples: Vec<HeartRateSample> = load(
            user_id,
            "heart_rate",
            health.heart_rate_samples_since(user_id, recent_since, HEART_RATE_SAMPLE_LIMIT),
        )
        .await;
        context.heart_rate_days = heart_rate_daily_averages(&hr_samples, RECENT_ROWS as usize);

        context.workouts =
            load(user_id, "workouts", health.recent_workouts(user_id, RECENT_ROWS)).await;
        context.step_days = load(
            user_id,
            "steps",
            health.daily_step_totals(user_id, recent_since, RECENT_ROWS),
        )
        .await;
        context.sleep = load(user_id, "sleep", health.recent_sleep(user_id, RECENT_ROWS)).await;
        context.daily_intention = load(
            user_id,
            "daily_intention",
            profiles.get_daily_intention(user_id, today),
        )
        .await;
        context.medical_conditions = load(
            user_id,
            "medical_conditions",
            profiles.active_medical_conditions(user_id),
        )
        .await;
        context.active_injuries = load(
            user_id,
            "injuries",
            self.database.injuries().list_active(user_id, true),
        )
        .await;

        let prior: Vec<CoachingRecommendation> = load(
            user_id,
            "previous_recommendations",
            self.database.recommendations().list_since(
                user_id,
                now - Duration::days(PRIOR_RECOMMENDATION_DAYS),
                PRIOR_RECOMMENDATION_LIMIT,
            ),
        )
        .await;
        context.previous_recommendations = prior.iter().map(PriorRecommendation::from).collect();

        context.today_stats = TodayStats {
            steps: load(
                user_id,
                "today_steps",
                health.total_steps_between(user_id, start_of_today, now),
            )
            .await,
            avg_heart_rate: load(
                user_id,
                "today_heart_rate",
                health.average_heart_rate_between(user_id, start_of_today, now),
            )
            .await
            .map(|avg: f64| avg.round() as u32),
            workout_count: load(
                user_id,
                "today_workouts",
                health.workouts_between(user_id, start_of_today, now),
            )
            .await
            .len(),
            vo2_max: context.vo2_history.first().map(|v| v.ml_per_kg_min),
        };

        context.refresh_trends();
        context
    }
}

/// Await one category, absorbing a failure into the empty value
async fn load<T, F>(user_id: &str, category: &str, fut: F) -> T
where
    T: Default,
    F: Future<Output = AppResult<T>>,
{
    match fut.await {
        Ok(value) => value,
        Err(e) => {
            warn!(
                user_id = %user_id,
                category = %category,
                error = %e,
                "Context category failed to load, continuing without it"
            );
            T::default()
        }
    }
}
