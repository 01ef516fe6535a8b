// ABOUTME: Agent tools for reporting injuries, logging check-ins and reading active injuries and history
// ABOUTME: History responses include recurrence patterns and the average recovery duration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::info;

use super::{
    bool_arg, optional_str_arg, parsed_arg, ranged_int_arg, required_str_arg, CoachingTool,
    ToolCapabilities, ToolContext,
};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ImprovementLevel, InjuryChange, InjurySeverity, InjuryStatus, NewInjury, UserInjury,
};

/// Pain level argument as `u8`
fn pain_arg(args: &Value, key: &str) -> AppResult<Option<u8>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| AppError::invalid_input(format!("{key} must be an integer from 1 to 10"))),
    }
}

// ============================================================================
// ReportInjuryTool
// ============================================================================

/// Record a new injury
pub struct ReportInjuryTool {
    database: Database,
}

impl ReportInjuryTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

/// Parse report arguments into a validated injury
///
/// # Errors
///
/// Returns `INVALID_INPUT` for missing fields, unknown severity, a bad date or pain outside 1..=10
pub fn new_injury_from_args(args: &Value) -> AppResult<NewInjury> {
    let severity_level = parsed_arg::<InjurySeverity>(args, "severity")?
        .ok_or_else(|| AppError::invalid_input("severity is required"))?;
    let pain_level = pain_arg(args, "pain_level")?
        .ok_or_else(|| AppError::invalid_input("pain_level is required"))?;
    let injury_date = optional_str_arg(args, "injury_date")
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                AppError::invalid_input(format!("injury_date must be YYYY-MM-DD: {e}"))
            })
        })
        .transpose()?;

    let injury = NewInjury {
        injury_type: required_str_arg(args, "injury_type")?,
        affected_area: required_str_arg(args, "affected_area")?,
        severity_level,
        pain_level,
        description: required_str_arg(args, "description")?,
        injury_date,
        symptoms: optional_str_arg(args, "symptoms"),
        treatment_plan: optional_str_arg(args, "treatment_plan"),
    };
    injury.validate()?;
    Ok(injury)
}

#[async_trait]
impl CoachingTool for ReportInjuryTool {
    fn name(&self) -> &'static str {
        "report_injury"
    }

    fn description(&self) -> &'static str {
        "Record a new injury the athlete reports, with type, affected area, severity and pain level"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "injury_type": {"type": "string", "description": "e.g. shin_splints, runners_knee"},
                "affected_area": {"type": "string", "description": "e.g. left_shin, right_knee"},
                "severity": {"type": "string", "enum": ["mild", "moderate", "severe"]},
                "pain_level": {"type": "integer", "description": "Pain from 1 to 10"},
                "description": {"type": "string"},
                "injury_date": {"type": "string", "description": "YYYY-MM-DD, defaults to today"},
                "symptoms": {"type": "string"},
                "treatment_plan": {"type": "string"}
            },
            "required": ["injury_type", "affected_area", "severity", "pain_level", "description"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_DATA | ToolCapabilities::INJURIES
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let new_injury = new_injury_from_args(&args)?;
        let injury = self
            .database
            .injuries()
            .report(&ctx.user_id, &new_injury)
            .await?;

        info!(
            user_id = %ctx.user_id,
            injury_id = %injury.id,
            severity = %injury.severity_level,
            "Injury reported"
        );

        Ok(json!({
            "success": true,
            "injury_id": injury.id,
            "injury_type": injury.injury_type,
            "affected_area": injury.affected_area,
            "severity_level": injury.severity_level,
            "pain_level": injury.current_pain_level,
            "status": injury.status,
            "message": format!(
                "Injury reported successfully: {} in {}",
                injury.injury_type, injury.affected_area
            ),
        }))
    }
}

// ============================================================================
// UpdateInjuryStatusTool
// ============================================================================

/// Log a check-in on an existing injury
pub struct UpdateInjuryStatusTool {
    database: Database,
}

impl UpdateInjuryStatusTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CoachingTool for UpdateInjuryStatusTool {
    fn name(&self) -> &'static str {
        "update_injury_status"
    }

    fn description(&self) -> &'static str {
        "Log a check-in on an injury: new pain level, improvement, status change, notes, activities and pain triggers"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "injury_id": {"type": "string"},
                "pain_level": {"type": "integer", "description": "Current pain from 1 to 10"},
                "improvement_level": {"type": "string", "enum": ["improving", "same", "worse"]},
                "status": {"type": "string", "enum": ["active", "recovering", "recovered", "chronic"]},
                "notes": {"type": "string"},
                "activities_performed": {"type": "string"},
                "pain_triggers": {"type": "string"}
            },
            "required": ["injury_id"]
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::WRITES_DATA | ToolCapabilities::INJURIES
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let injury_id = required_str_arg(&args, "injury_id")?;
        let change = InjuryChange {
            pain_level: pain_arg(&args, "pain_level")?,
            improvement_level: parsed_arg::<ImprovementLevel>(&args, "improvement_level")?,
            status: parsed_arg::<InjuryStatus>(&args, "status")?,
            notes: optional_str_arg(&args, "notes"),
            activities_performed: optional_str_arg(&args, "activities_performed"),
            pain_triggers: optional_str_arg(&args, "pain_triggers"),
        };

        let (injury, updated_fields) = self
            .database
            .injuries()
            .update(&injury_id, &ctx.user_id, &change)
            .await?;

        Ok(json!({
            "success": true,
            "injury_id": injury.id,
            "injury_type": injury.injury_type,
            "affected_area": injury.affected_area,
            "current_pain_level": injury.current_pain_level,
            "status": injury.status,
            "improvement_level": change.improvement_level,
            "updated_fields": updated_fields,
            "message": format!(
                "Injury update recorded for {} ({})",
                injury.injury_type, injury.status
            ),
        }))
    }
}

// ============================================================================
// GetActiveInjuriesTool
// ============================================================================

/// Injuries that currently limit training
pub struct GetActiveInjuriesTool {
    database: Database,
}

impl GetActiveInjuriesTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

fn active_injury_json(injury: &UserInjury, today: NaiveDate) -> Value {
    json!({
        "injury_id": injury.id,
        "injury_type": injury.injury_type,
        "affected_area": injury.affected_area,
        "severity_level": injury.severity_level,
        "current_pain_level": injury.current_pain_level,
        "initial_pain_level": injury.initial_pain_level,
        "status": injury.status,
        "injury_date": injury.injury_date.date_naive().to_string(),
        "days_since_injury": injury.days_since_injury(today),
        "description": injury.description,
        "symptoms": injury.symptoms,
        "treatment_plan": injury.treatment_plan,
        "activity_restrictions": injury.activity_restrictions,
        "last_update": injury.last_update_date.map(|d| d.to_rfc3339()),
    })
}

/// Injury with the highest current pain, first one on ties
#[must_use]
pub fn most_severe_injury(injuries: &[UserInjury]) -> Option<&UserInjury> {
    injuries.iter().reduce(|best, candidate| {
        if candidate.current_pain_level.unwrap_or(0) > best.current_pain_level.unwrap_or(0) {
            candidate
        } else {
            best
        }
    })
}

#[async_trait]
impl CoachingTool for GetActiveInjuriesTool {
    fn name(&self) -> &'static str {
        "get_active_injuries"
    }

    fn description(&self) -> &'static str {
        "List the athlete's active injuries, optionally including recovering ones. Check this before proposing any workout"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "include_recovering": {
                    "type": "boolean",
                    "description": "Include injuries in recovery (default true)"
                }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::INJURIES
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let include_recovering = bool_arg(&args, "include_recovering", true)?;
        let injuries = self
            .database
            .injuries()
            .list_active(&ctx.user_id, include_recovering)
            .await?;

        if injuries.is_empty() {
            return Ok(json!({
                "has_injuries": false,
                "total_injuries": 0,
                "injuries": [],
                "message": "No active injuries found",
            }));
        }

        let today = Utc::now().date_naive();
        let most_severe = most_severe_injury(&injuries).map(|injury| {
            json!({
                "injury_type": injury.injury_type,
                "affected_area": injury.affected_area,
                "pain_level": injury.current_pain_level,
            })
        });

        Ok(json!({
            "has_injuries": true,
            "total_injuries": injuries.len(),
            "injuries": injuries.iter().map(|i| active_injury_json(i, today)).collect::<Vec<_>>(),
            "most_severe_injury": most_severe,
            "message": format!("Found {} active/recovering injuries", injuries.len()),
        }))
    }
}

// ============================================================================
// GetInjuryHistoryTool
// ============================================================================

/// Past injuries with recurrence patterns
pub struct GetInjuryHistoryTool {
    database: Database,
}

impl GetInjuryHistoryTool {
    /// Create the tool over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

/// Type and area counts, recurring types and average recovery days
///
/// A type is recurring when it appears more than once; its most common area
/// breaks ties alphabetically.
#[must_use]
pub fn injury_patterns(injuries: &[UserInjury]) -> Value {
    let mut type_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut area_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut areas_by_type: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for injury in injuries {
        *type_counts.entry(injury.injury_type.as_str()).or_default() += 1;
        *area_counts.entry(injury.affected_area.as_str()).or_default() += 1;
        *areas_by_type
            .entry(injury.injury_type.as_str())
            .or_default()
            .entry(injury.affected_area.as_str())
            .or_default() += 1;
    }

    let recurring: Vec<Value> = type_counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(injury_type, count)| {
            let most_common_area = areas_by_type.get(injury_type).and_then(|areas| {
                areas
                    .iter()
                    .fold(None, |best: Option<(&str, usize)>, (area, n)| match best {
                        Some((_, best_n)) if best_n >= *n => best,
                        _ => Some((*area, *n)),
                    })
                    .map(|(area, _)| area)
            });
            json!({
                "injury_type": injury_type,
                "occurrences": count,
                "most_common_area": most_common_area,
            })
        })
        .collect();

    let recovery_days: Vec<i64> = injuries.iter().filter_map(UserInjury::days_to_recover).collect();
    let average_recovery_days = if recovery_days.is_empty() {
        None
    } else {
        Some((recovery_days.iter().sum::<i64>() as f64 / recovery_days.len() as f64).round())
    };

    json!({
        "injury_type_counts": type_counts,
        "affected_area_counts": area_counts,
        "recurring_injuries": recurring,
        "average_recovery_days": average_recovery_days,
    })
}

fn history_injury_json(injury: &UserInjury) -> Value {
    let pain = |level: Option<u8>| level.map_or_else(|| "?".to_owned(), |l| l.to_string());
    json!({
        "injury_id": injury.id,
        "injury_type": injury.injury_type,
        "affected_area": injury.affected_area,
        "severity_level": injury.severity_level,
        "status": injury.status,
        "injury_date": injury.injury_date.date_naive().to_string(),
        "pain_range": format!(
            "{} → {}",
            pain(injury.initial_pain_level),
            pain(injury.current_pain_level)
        ),
        "days_to_recover": injury.days_to_recover(),
        "description": injury.description,
    })
}

#[async_trait]
impl CoachingTool for GetInjuryHistoryTool {
    fn name(&self) -> &'static str {
        "get_injury_history"
    }

    fn description(&self) -> &'static str {
        "Get the athlete's injury history over the last N days with recurrence patterns and average recovery time"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days_back": {
                    "type": "integer",
                    "description": "Days of history (1-365, default 180)"
                },
                "include_recovered": {
                    "type": "boolean",
                    "description": "Include recovered injuries (default true)"
                }
            }
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::INJURIES | ToolCapabilities::ANALYTICS
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let days_back = ranged_int_arg(&args, "days_back", 180, 1, 365)?;
        let include_recovered = bool_arg(&args, "include_recovered", true)?;
        let injuries = self
            .database
            .injuries()
            .list_history(
                &ctx.user_id,
                Utc::now() - Duration::days(days_back),
                include_recovered,
            )
            .await?;

        if injuries.is_empty() {
            return Ok(json!({
                "total_injuries": 0,
                "injuries": [],
                "patterns": {},
                "message": format!("No injuries found in the last {days_back} days"),
            }));
        }

        let mut status_breakdown: BTreeMap<&str, usize> = BTreeMap::new();
        for injury in &injuries {
            *status_breakdown.entry(injury.status.as_str()).or_default() += 1;
        }

        Ok(json!({
            "total_injuries": injuries.len(),
            "injuries": injuries.iter().map(history_injury_json).collect::<Vec<_>>(),
            "status_breakdown": status_breakdown,
            "patterns": injury_patterns(&injuries),
            "days_analyzed": days_back,
            "message": format!("Found {} injuries in the last {days_back} days", injuries.len()),
        }))
    }
}
