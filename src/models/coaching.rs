// ABOUTME: Coaching recommendation models with lifecycle status and extracted workout fields
// ABOUTME: Draft plans, persisted recommendations, partial updates and agent chat sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Canonical workout category of a plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    /// Running or jogging
    Run,
    /// Walking
    Walk,
    /// Cycling
    Cycling,
    /// Rest or active recovery
    Rest,
    /// Interval or HIIT session
    Interval,
}

impl WorkoutType {
    /// All variants, in extraction priority order
    pub const ALL: [Self; 5] = [Self::Run, Self::Walk, Self::Cycling, Self::Rest, Self::Interval];

    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Walk => "walk",
            Self::Cycling => "cycling",
            Self::Rest => "rest",
            Self::Interval => "interval",
        }
    }
}

impl Display for WorkoutType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "run" => Ok(Self::Run),
            "walk" => Ok(Self::Walk),
            "cycling" => Ok(Self::Cycling),
            "rest" => Ok(Self::Rest),
            "interval" => Ok(Self::Interval),
            _ => Err(AppError::invalid_input(format!(
                "Invalid workout type: {s}. Must be one of: run, walk, cycling, rest, interval"
            ))),
        }
    }
}

/// Lifecycle status of a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    /// Not yet evaluated
    #[default]
    Pending,
    /// Done as prescribed
    Completed,
    /// Not done
    Skipped,
    /// Done in part or differently
    Partial,
}

impl RecommendationStatus {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Partial => "partial",
        }
    }

    /// Whether compliance has already been decided
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for RecommendationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "partial" => Ok(Self::Partial),
            _ => Err(AppError::invalid_input(format!(
                "Invalid status: {s}. Must be one of: pending, completed, skipped, partial"
            ))),
        }
    }
}

/// Four-field plan produced by the generator before persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationDraft {
    /// Greeting, stats line and today's workout
    #[serde(default)]
    pub todays_training: String,
    /// Fueling guidance
    #[serde(default)]
    pub nutrition_fueling: String,
    /// Sleep and mobility guidance
    #[serde(default)]
    pub recovery_protocol: String,
    /// Why this plan
    #[serde(default)]
    pub reasoning: String,
}

impl RecommendationDraft {
    /// True when every field is blank
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.todays_training,
            &self.nutrition_fueling,
            &self.recovery_protocol,
            &self.reasoning,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }
}

/// Query-friendly fields pattern-matched out of the plan text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutDetails {
    /// Workout category
    pub workout_type: Option<WorkoutType>,
    /// Duration in minutes
    pub duration_minutes: Option<u32>,
    /// `zone_N`
    pub intensity_zone: Option<String>,
    /// `low-high` bpm
    pub heart_rate_range: Option<String>,
}

/// One day's persisted plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoachingRecommendation {
    /// Recommendation id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// When the plan was generated
    pub recommendation_date: DateTime<Utc>,
    /// Calendar day (UTC) the plan applies to
    pub recommendation_day: NaiveDate,
    /// Workout text
    pub todays_training: String,
    /// Nutrition text
    pub nutrition_fueling: String,
    /// Recovery text
    pub recovery_protocol: String,
    /// Reasoning text
    pub reasoning: String,
    /// Extracted workout category
    pub workout_type: Option<WorkoutType>,
    /// Extracted duration
    pub duration_minutes: Option<u32>,
    /// Extracted zone
    pub intensity_zone: Option<String>,
    /// Extracted heart-rate range
    pub heart_rate_range: Option<String>,
    /// Lifecycle status
    pub status: RecommendationStatus,
    /// Workout that satisfied the plan
    pub actual_workout_id: Option<String>,
    /// Compliance or status-update notes
    pub compliance_notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl CoachingRecommendation {
    /// The four free-text fields as a draft
    #[must_use]
    pub fn draft(&self) -> RecommendationDraft {
        RecommendationDraft {
            todays_training: self.todays_training.clone(),
            nutrition_fueling: self.nutrition_fueling.clone(),
            recovery_protocol: self.recovery_protocol.clone(),
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Partial update of a recommendation; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationUpdate {
    /// New workout text
    pub todays_training: Option<String>,
    /// New nutrition text
    pub nutrition_fueling: Option<String>,
    /// New recovery text
    pub recovery_protocol: Option<String>,
    /// New reasoning text
    pub reasoning: Option<String>,
    /// New workout category
    pub workout_type: Option<WorkoutType>,
    /// New duration
    pub duration_minutes: Option<u32>,
    /// New zone
    pub intensity_zone: Option<String>,
    /// New heart-rate range
    pub heart_rate_range: Option<String>,
    /// New status
    pub status: Option<RecommendationStatus>,
    /// New notes
    pub compliance_notes: Option<String>,
}

impl RecommendationUpdate {
    /// Status change with optional notes
    #[must_use]
    pub fn status(status: RecommendationStatus, notes: Option<String>) -> Self {
        Self {
            status: Some(status),
            compliance_notes: notes,
            ..Self::default()
        }
    }

    /// Names of the fields this update sets, in column order
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("todays_training", self.todays_training.is_some()),
            ("nutrition_fueling", self.nutrition_fueling.is_some()),
            ("recovery_protocol", self.recovery_protocol.is_some()),
            ("reasoning", self.reasoning.is_some()),
            ("workout_type", self.workout_type.is_some()),
            ("duration_minutes", self.duration_minutes.is_some()),
            ("intensity_zone", self.intensity_zone.is_some()),
            ("heart_rate_range", self.heart_rate_range.is_some()),
            ("status", self.status.is_some()),
            ("compliance_notes", self.compliance_notes.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Metadata row of a coaching chat thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoachingSession {
    /// Session id, also the conversation thread key
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// First message time
    pub started_at: DateTime<Utc>,
    /// Most recent message time
    pub last_active_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_rejects_unknown_values() {
        assert_eq!(
            "Completed".parse::<RecommendationStatus>().unwrap(),
            RecommendationStatus::Completed
        );
        assert!("done".parse::<RecommendationStatus>().is_err());
        assert!(!RecommendationStatus::Pending.is_terminal());
        assert!(RecommendationStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_changed_fields_lists_only_set_fields() {
        let update = RecommendationUpdate {
            duration_minutes: Some(45),
            ..RecommendationUpdate::status(RecommendationStatus::Partial, None)
        };
        assert_eq!(update.changed_fields(), vec!["duration_minutes", "status"]);
    }

    #[test]
    fn test_draft_emptiness() {
        assert!(RecommendationDraft::default().is_empty());
        let draft = RecommendationDraft {
            reasoning: "Build base".to_owned(),
            ..RecommendationDraft::default()
        };
        assert!(!draft.is_empty());
    }
}
