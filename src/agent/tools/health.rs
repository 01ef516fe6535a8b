// ABOUTME: Agent tools for live health data, the athlete profile, VO2max trends and workout history
// ABOUTME: Includes the least-squares VO2max trend analysis used by get_vo2_trends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use super::{ranged_int_arg, round_to, CoachingTool, ToolCapabilities, ToolContext};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Vo2MaxEstimate, WorkoutSession};

/// Workouts returned by `get_workout_details`
const MAX_WORKOUT_DETAILS: i64 = 20;
/// Measurements echoed back by `get_vo2_trends`
const RECENT_VO2_MEASUREMENTS: usize = 10;
/// Slope per day under which the VO2 trend is stable
const STABLE_SLOPE_PER_DAY: f64 = 0.01;
/// Seconds in a day, for fractional day offsets
const SECONDS_PER_DAY: f64 = 86_400.0;

// ============================================================================
// GetUserHealthDataTool
// ============================================================================

/// Current VO2max and the last 24 hours of heart rate
pub struct GetUserHealthDataTool {
    database: Database,
}

impl GetUserHealthDataTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for GetUserHealthDataTool {
    fn name(&self) -> &'static str {
        "get_user_health_data"
    }

    fn description(&self) -> &'static str {
        "Get the athlete's current health snapshot: name, age, latest VO2max and average heart rate over the last 24 hours"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let profile = self
            .database
            .profiles()
            .get_profile(&ctx.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User profile"))?;

        let health = self.database.health_data();
        let latest_vo2 = health.recent_vo2max(&ctx.user_id, 1).await?.into_iter().next();
        let now = Utc::now();
        let avg_heart_rate = health
            .average_heart_rate_between(&ctx.user_id, now - Duration::hours(24), now)
            .await?
            .map(f64::round);

        Ok(json!({
            "first_name": profile.first_name,
            "age": profile.age,
            "vo2_max": latest_vo2.as_ref().map(|v| v.ml_per_kg_min),
            "vo2_measured_at": latest_vo2.as_ref().map(|v| v.measured_at.to_rfc3339()),
            "avg_heart_rate_24h": avg_heart_rate,
        }))
    }
}

// ============================================================================
// GetUserProfileTool
// ============================================================================

/// Demographics, goals, training preferences and weight
pub struct GetUserProfileTool {
    database: Database,
}

impl GetUserProfileTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for GetUserProfileTool {
    fn name(&self) -> &'static str {
        "get_user_profile"
    }

    fn description(&self) -> &'static str {
        "Get the athlete's profile: demographics, active goals, training preferences and current and target weight"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let profiles = self.database.profiles();
        let profile = profiles.get_profile(&ctx.user_id).await?;
        let goals = profiles.list_active_goals(&ctx.user_id).await?;
        let preferences = profiles.get_training_preferences(&ctx.user_id).await?;
        let current_weight = profiles
            .recent_weights(&ctx.user_id, 1)
            .await?
            .into_iter()
            .next()
            .map(|w| w.value_lbs);

        let weight_goal = goals
            .iter()
            .find(|g| g.goal_type.to_lowercase().contains("weight"));

        Ok(json!({
            "profile": profile.map(|p| json!({
                "first_name": p.first_name,
                "last_name": p.last_name,
                "age": p.age,
                "gender": p.gender,
                "height_inches": p.height_inches,
            })),
            "goals": goals.iter().map(|g| json!({
                "goal_type": g.goal_type,
                "description": g.description,
                "target_value": g.target_value,
                "target_unit": g.target_unit,
                "target_date": g.target_date,
            })).collect::<Vec<_>>(),
            "training_preferences": preferences,
            "current_weight_lbs": current_weight,
            "target_weight_lbs": weight_goal.and_then(|g| g.target_value),
            "weight_goal_type": weight_goal.map(|g| g.goal_type.clone()),
        }))
    }
}

// ============================================================================
// GetVo2TrendsTool
// ============================================================================

/// Linear trend of VO2max over a lookback window
pub struct GetVo2TrendsTool {
    database: Database,
}

impl GetVo2TrendsTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for GetVo2TrendsTool {
    fn name(&self) -> &'static str {
        "get_vo2_trends"
    }

    fn description(&self) -> &'static str {
        "Analyze the VO2max trend over the last N days: direction, strength, monthly improvement rate and volatility"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days_back": {
                    "type": "integer",
                    "description": "Days of history to analyze (1-365, default 90)"
                }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::ANALYTICS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let days_back = ranged_int_arg(&args, "days_back", 90, 1, 365)?;
        let measurements = self
            .database
            .health_data()
            .vo2max_since(&ctx.user_id, Utc::now() - Duration::days(days_back))
            .await?;

        let recent: Vec<Value> = measurements
            .iter()
            .rev()
            .take(RECENT_VO2_MEASUREMENTS)
            .map(|m| {
                json!({
                    "value": m.ml_per_kg_min,
                    "measured_at": m.measured_at.to_rfc3339(),
                    "estimation_method": m.estimation_method,
                })
            })
            .collect();

        Ok(json!({
            "trend_analysis": analyze_vo2_trend(&measurements),
            "recent_measurements": recent,
            "total_measurements": measurements.len(),
        }))
    }
}

/// Least-squares trend over measurements ordered oldest first
///
/// The x axis is fractional days since the first measurement. Direction is
/// stable while the slope stays under 0.01 per day; `trend_strength` is r².
#[must_use]
pub fn analyze_vo2_trend(measurements: &[Vo2MaxEstimate]) -> Value {
    let (Some(first), Some(last)) = (measurements.first(), measurements.last()) else {
        return insufficient_data(measurements.len());
    };
    if measurements.len() < 2 {
        return insufficient_data(measurements.len());
    }

    let points: Vec<(f64, f64)> = measurements
        .iter()
        .map(|m| (days_between(first.measured_at, m.measured_at), m.ml_per_kg_min))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy, syy) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, sxy, syy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (dx.mul_add(dx, sxx), dx.mul_add(dy, sxy), dy.mul_add(dy, syy))
    });

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let r_squared = if sxx > 0.0 && syy > 0.0 {
        (sxy * sxy) / (sxx * syy)
    } else {
        0.0
    };
    let volatility = (syy / (n - 1.0)).sqrt();

    let direction = if slope.abs() < STABLE_SLOPE_PER_DAY {
        "stable"
    } else if slope > 0.0 {
        "improving"
    } else {
        "declining"
    };

    let total_change = last.ml_per_kg_min - first.ml_per_kg_min;
    let total_change_percent = if first.ml_per_kg_min > 0.0 {
        total_change / first.ml_per_kg_min * 100.0
    } else {
        0.0
    };

    json!({
        "trend_direction": direction,
        "trend_strength": round_to(r_squared, 3),
        "improvement_rate": round_to(slope * 30.0, 2),
        "volatility": round_to(volatility, 2),
        "data_points": measurements.len(),
        "latest_value": last.ml_per_kg_min,
        "earliest_value": first.ml_per_kg_min,
        "total_change": round_to(total_change, 2),
        "total_change_percent": round_to(total_change_percent, 1),
    })
}

fn insufficient_data(points: usize) -> Value {
    json!({
        "trend_direction": "insufficient_data",
        "trend_strength": 0,
        "improvement_rate": 0,
        "volatility": 0,
        "data_points": points,
    })
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

// ============================================================================
// GetWorkoutDetailsTool
// ============================================================================

/// Recent workouts with aggregate statistics
pub struct GetWorkoutDetailsTool {
    database: Database,
}

impl GetWorkoutDetailsTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for GetWorkoutDetailsTool {
    fn name(&self) -> &'static str {
        "get_workout_details"
    }

    fn description(&self) -> &'static str {
        "Get workouts from the last N days with distance, duration, calories, heart rate and an activity breakdown"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days_back": {
                    "type": "integer",
                    "description": "Days of history to include (1-90, default 7)"
                }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::ANALYTICS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let days_back = ranged_int_arg(&args, "days_back", 7, 1, 90)?;
        let workouts = self
            .database
            .health_data()
            .workouts_since(
                &ctx.user_id,
                Utc::now() - Duration::days(days_back),
                MAX_WORKOUT_DETAILS,
            )
            .await?;

        if workouts.is_empty() {
            return Ok(json!({
                "message": format!("No workouts found in the last {days_back} days"),
                "workouts": [],
                "stats": {},
            }));
        }

        Ok(json!({
            "workouts": workouts.iter().map(workout_json).collect::<Vec<_>>(),
            "stats": workout_stats(&workouts, days_back),
        }))
    }
}

fn workout_json(workout: &WorkoutSession) -> Value {
    json!({
        "date": workout.start_time.to_rfc3339(),
        "activity_type": workout.activity_type,
        "duration_minutes": workout.duration_minutes().round(),
        "distance_miles": workout.distance_miles.map(|d| round_to(d, 2)),
        "calories": workout.calories,
        "avg_heart_rate": workout.avg_heart_rate,
        "max_heart_rate": workout.max_heart_rate,
    })
}

/// Totals, averages and a per-activity count over a workout window
#[must_use]
pub fn workout_stats(workouts: &[WorkoutSession], days_analyzed: i64) -> Value {
    let total_distance: f64 = workouts.iter().filter_map(|w| w.distance_miles).sum();
    let total_minutes: f64 = workouts.iter().map(WorkoutSession::duration_minutes).sum();
    let total_calories: f64 = workouts.iter().filter_map(|w| w.calories).sum();
    let avg_minutes = if workouts.is_empty() {
        0.0
    } else {
        total_minutes / workouts.len() as f64
    };

    let mut breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for workout in workouts {
        *breakdown
            .entry(workout.activity_type.to_lowercase())
            .or_default() += 1;
    }

    json!({
        "total_workouts": workouts.len(),
        "total_distance_miles": round_to(total_distance, 2),
        "total_duration_minutes": total_minutes.round(),
        "total_calories": total_calories.round(),
        "avg_duration_minutes": avg_minutes.round(),
        "activity_breakdown": breakdown,
        "days_analyzed": days_analyzed,
    })
}
