// ABOUTME: Agent tools for reading previous coaching plans and creating or editing today's plan
// ABOUTME: Plan writes go through the recommendation store so extraction and the per-day upsert apply
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::info;

use super::{
    optional_str_arg, parsed_arg, positive_u32_arg, ranged_int_arg, required_str_arg, round_to,
    CoachingTool, ToolCapabilities, ToolContext,
};
use crate::coaching::extraction::extract_workout_details;
use crate::coaching::trends::ComplianceSummary;
use crate::constants::recommendations::LIST_RECENT_CAP;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CoachingRecommendation, RecommendationDraft, RecommendationStatus, RecommendationUpdate,
    WorkoutDetails, WorkoutType,
};

fn workout_type_names() -> Vec<&'static str> {
    WorkoutType::ALL.iter().map(WorkoutType::as_str).collect()
}

fn plan_json(plan: &CoachingRecommendation, today: NaiveDate) -> Value {
    json!({
        "plan_id": plan.id,
        "date": plan.recommendation_day.to_string(),
        "is_today": plan.recommendation_day == today,
        "workout_type": plan.workout_type,
        "duration_minutes": plan.duration_minutes,
        "intensity_zone": plan.intensity_zone,
        "heart_rate_range": plan.heart_rate_range,
        "todays_training": plan.todays_training,
        "nutrition_fueling": plan.nutrition_fueling,
        "recovery_protocol": plan.recovery_protocol,
        "reasoning": plan.reasoning,
        "status": plan.status,
        "compliance_notes": plan.compliance_notes,
    })
}

// ============================================================================
// GetPreviousPlansTool
// ============================================================================

/// Plans from the last N days with their compliance
pub struct GetPreviousPlansTool {
    database: Database,
}

impl GetPreviousPlansTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for GetPreviousPlansTool {
    fn name(&self) -> &'static str {
        "get_previous_plans"
    }

    fn description(&self) -> &'static str {
        "Get coaching plans from the last N days with their completion status, including whether a plan already exists for today"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": {
                    "type": "integer",
                    "description": "Days of plans to include (1-90, default 7)"
                }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::PLANS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let days = ranged_int_arg(&args, "days", 7, 1, 90)?;
        let now = Utc::now();
        let plans = self
            .database
            .recommendations()
            .list_since(&ctx.user_id, now - Duration::days(days), LIST_RECENT_CAP)
            .await?;

        if plans.is_empty() {
            return Ok(json!({
                "message": "No previous recommendations found",
                "plans": [],
            }));
        }

        let today = now.date_naive();
        let summary = ComplianceSummary::from_statuses(plans.iter().map(|p| p.status));
        let todays_plan = plans
            .iter()
            .find(|p| p.recommendation_day == today)
            .map(|p| plan_json(p, today));

        Ok(json!({
            "total_recommendations": summary.total,
            "completed": summary.completed,
            "compliance_rate": round_to(summary.rate, 1),
            "todays_plan": todays_plan,
            "plans": plans.iter().map(|p| plan_json(p, today)).collect::<Vec<_>>(),
        }))
    }
}

// ============================================================================
// CreateCoachingPlanTool
// ============================================================================

/// Save a plan the athlete has agreed to
pub struct CreateCoachingPlanTool {
    database: Database,
}

impl CreateCoachingPlanTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for CreateCoachingPlanTool {
    fn name(&self) -> &'static str {
        "create_coaching_plan"
    }

    fn description(&self) -> &'static str {
        "Save today's coaching plan. Only call after the athlete explicitly confirms the proposed plan. Fails if a plan for today already exists; use update_coaching_plan instead"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todays_training": {"type": "string", "description": "Full workout description"},
                "workout_type": {"type": "string", "enum": workout_type_names()},
                "duration_minutes": {"type": "integer", "description": "Planned duration, greater than 0"},
                "intensity_zone": {"type": "string", "description": "e.g. zone_2"},
                "heart_rate_range": {"type": "string", "description": "e.g. 130-145"},
                "nutrition_fueling": {"type": "string"},
                "recovery_protocol": {"type": "string"},
                "reasoning": {"type": "string"}
            },
            "required": ["todays_training", "workout_type", "duration_minutes"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_DATA | ToolCapabilities::PLANS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let todays_training = required_str_arg(&args, "todays_training")?;
        let workout_type = parsed_arg::<WorkoutType>(&args, "workout_type")?
            .ok_or_else(|| AppError::invalid_input("workout_type is required"))?;
        let duration_minutes = positive_u32_arg(&args, "duration_minutes")?
            .ok_or_else(|| AppError::invalid_input("duration_minutes is required"))?;

        let store = self.database.recommendations();
        if let Some(existing) = store.get_today(&ctx.user_id).await? {
            return Err(AppError::already_exists(format!(
                "A coaching plan already exists for today ({}); use update_coaching_plan to change it",
                existing.id
            )));
        }

        let draft = RecommendationDraft {
            todays_training,
            nutrition_fueling: optional_str_arg(&args, "nutrition_fueling").unwrap_or_default(),
            recovery_protocol: optional_str_arg(&args, "recovery_protocol").unwrap_or_default(),
            reasoning: optional_str_arg(&args, "reasoning").unwrap_or_default(),
        };
        let details = WorkoutDetails {
            workout_type: Some(workout_type),
            duration_minutes: Some(duration_minutes),
            intensity_zone: optional_str_arg(&args, "intensity_zone"),
            heart_rate_range: optional_str_arg(&args, "heart_rate_range"),
        };
        let plan = store
            .create_with_details(&ctx.user_id, &draft, &details)
            .await?;

        info!(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            plan_id = %plan.id,
            "Coaching plan created by agent"
        );

        Ok(json!({
            "success": true,
            "plan_id": plan.id,
            "workout_type": plan.workout_type,
            "duration_minutes": plan.duration_minutes,
            "intensity_zone": plan.intensity_zone,
            "heart_rate_range": plan.heart_rate_range,
            "message": "Coaching plan saved successfully",
        }))
    }
}

// ============================================================================
// UpdateCoachingPlanTool
// ============================================================================

/// Edit fields or the status of an existing plan
pub struct UpdateCoachingPlanTool {
    database: Database,
}

impl UpdateCoachingPlanTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

/// Build a plan update from tool arguments
///
/// New training text without explicit structured fields has them re-extracted.
///
/// # Errors
///
/// Returns `INVALID_INPUT` for bad enum values or when nothing would change
pub fn plan_update_from_args(args: &Value) -> AppResult<RecommendationUpdate> {
    let mut update = RecommendationUpdate {
        todays_training: optional_str_arg(args, "todays_training"),
        nutrition_fueling: optional_str_arg(args, "nutrition_fueling"),
        recovery_protocol: optional_str_arg(args, "recovery_protocol"),
        reasoning: optional_str_arg(args, "reasoning"),
        workout_type: parsed_arg::<WorkoutType>(args, "workout_type")?,
        duration_minutes: positive_u32_arg(args, "duration_minutes")?,
        intensity_zone: optional_str_arg(args, "intensity_zone"),
        heart_rate_range: optional_str_arg(args, "heart_rate_range"),
        status: parsed_arg::<RecommendationStatus>(args, "status")?,
        compliance_notes: None,
    };

    if let Some(text) = update.todays_training.as_deref() {
        let details = extract_workout_details(text);
        update.workout_type = update.workout_type.or(details.workout_type);
        update.duration_minutes = update.duration_minutes.or(details.duration_minutes);
        update.intensity_zone = update.intensity_zone.take().or(details.intensity_zone);
        update.heart_rate_range = update.heart_rate_range.take().or(details.heart_rate_range);
    }

    if update.changed_fields().is_empty() {
        return Err(AppError::invalid_input("No fields to update"));
    }
    Ok(update)
}

#[async_trait]
impl CoachingTool for UpdateCoachingPlanTool {
    fn name(&self) -> &'static str {
        "update_coaching_plan"
    }

    fn description(&self) -> &'static str {
        "Update an existing coaching plan by id: change the workout, durations, guidance text or status"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "plan_id": {"type": "string"},
                "todays_training": {"type": "string"},
                "workout_type": {"type": "string", "enum": workout_type_names()},
                "duration_minutes": {"type": "integer"},
                "intensity_zone": {"type": "string"},
                "heart_rate_range": {"type": "string"},
                "nutrition_fueling": {"type": "string"},
                "recovery_protocol": {"type": "string"},
                "reasoning": {"type": "string"},
                "status": {"type": "string", "enum": ["pending", "completed", "skipped", "partial"]}
            },
            "required": ["plan_id"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_DATA | ToolCapabilities::PLANS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let plan_id = required_str_arg(&args, "plan_id")?;
        let update = plan_update_from_args(&args)?;
        let updated_fields = update.changed_fields();

        let plan = self
            .database
            .recommendations()
            .update(&plan_id, &ctx.user_id, &update)
            .await?;

        Ok(json!({
            "success": true,
            "plan_id": plan.id,
            "updated_fields": updated_fields,
            "workout_type": plan.workout_type,
            "duration_minutes": plan.duration_minutes,
            "intensity_zone": plan.intensity_zone,
            "heart_rate_range": plan.heart_rate_range,
            "status": plan.status,
            "message": format!(
                "Coaching plan updated successfully. Updated: {}",
                updated_fields.join(", ")
            ),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_requires_a_field() {
        let err = plan_update_from_args(&json!({"plan_id": "p1"})).unwrap_err();
        assert!(err.message.contains("No fields"));
    }

    #[test]
    fn test_update_rejects_unknown_status() {
        assert!(plan_update_from_args(&json!({"status": "done"})).is_err());
    }

    #[test]
    fn test_new_training_text_fills_structured_fields() {
        let update = plan_update_from_args(&json!({
            "todays_training": "45-min easy run, Zone 2 (130-145 BPM)"
        }))
        .unwrap();
        assert_eq!(update.workout_type, Some(WorkoutType::Run));
        assert_eq!(update.duration_minutes, Some(45));
        assert_eq!(update.intensity_zone.as_deref(), Some("zone_2"));
        assert_eq!(update.heart_rate_range.as_deref(), Some("130-145"));
    }

    #[test]
    fn test_explicit_fields_win_over_extraction() {
        let update = plan_update_from_args(&json!({
            "todays_training": "45-min easy run",
            "workout_type": "walk",
            "duration_minutes": 20
        }))
        .unwrap();
        assert_eq!(update.workout_type, Some(WorkoutType::Walk));
        assert_eq!(update.duration_minutes, Some(20));
    }
}
