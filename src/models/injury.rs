// ABOUTME: Injury tracking models with a status state machine and a progress timeline
// ABOUTME: Severity, status transitions, pain-level validation, report and change inputs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// Lowest accepted pain level
pub const MIN_PAIN_LEVEL: u8 = 1;
/// Highest accepted pain level
pub const MAX_PAIN_LEVEL: u8 = 10;

/// Reject pain levels outside 1..=10
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the level is out of range
pub fn validate_pain_level(level: u8) -> AppResult<u8> {
    if (MIN_PAIN_LEVEL..=MAX_PAIN_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(AppError::invalid_input(format!(
            "Pain level must be between {MIN_PAIN_LEVEL} and {MAX_PAIN_LEVEL}, got {level}"
        )))
    }
}

/// How bad an injury is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InjurySeverity {
    /// Minor discomfort, can train with modifications
    Mild,
    /// Significant pain, needs rest or major modifications
    Moderate,
    /// May need medical attention
    Severe,
}

impl InjurySeverity {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl Display for InjurySeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for InjurySeverity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            _ => Err(AppError::invalid_input(format!(
                "Invalid severity level: {s}. Must be one of: mild, moderate, severe"
            ))),
        }
    }
}

/// Where an injury is in its lifecycle
///
/// ```text
/// active ──> recovering ──> recovered
///   │  ^         │              ^
///   │  └─────────┤              │
///   └──> chronic <┘─────────────┘
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    /// Currently injured
    #[default]
    Active,
    /// Getting better but still affecting training
    Recovering,
    /// Fully healed
    Recovered,
    /// Long-term ongoing issue
    Chronic,
}

impl InjuryStatus {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Recovering => "recovering",
            Self::Recovered => "recovered",
            Self::Chronic => "chronic",
        }
    }

    /// Whether the injury still limits training
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Recovering)
    }

    /// Whether moving from `self` to `next` is allowed; staying put always is
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (*self, next) {
            (Self::Active, _)
            | (Self::Recovering, _)
            | (Self::Chronic, Self::Recovering | Self::Recovered | Self::Chronic)
            | (Self::Recovered, Self::Recovered) => true,
            (Self::Chronic, Self::Active) | (Self::Recovered, _) => false,
        }
    }

    /// Validate a transition
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a disallowed transition
    pub fn transition_to(&self, next: Self) -> AppResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::invalid_input(format!(
                "Cannot change injury status from {self} to {next}"
            )))
        }
    }
}

impl Display for InjuryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for InjuryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "recovering" => Ok(Self::Recovering),
            "recovered" => Ok(Self::Recovered),
            "chronic" => Ok(Self::Chronic),
            _ => Err(AppError::invalid_input(format!(
                "Invalid injury status: {s}. Must be one of: active, recovering, recovered, chronic"
            ))),
        }
    }
}

/// Direction an injury moved since the last check-in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImprovementLevel {
    /// Getting better
    Improving,
    /// No change
    Same,
    /// Getting worse
    Worse,
}

impl ImprovementLevel {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Same => "same",
            Self::Worse => "worse",
        }
    }
}

impl Display for ImprovementLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImprovementLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "improving" => Ok(Self::Improving),
            "same" => Ok(Self::Same),
            "worse" => Ok(Self::Worse),
            _ => Err(AppError::invalid_input(format!(
                "Invalid improvement level: {s}. Must be one of: improving, same, worse"
            ))),
        }
    }
}

/// A reported injury
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInjury {
    /// Injury id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// e.g. `shin_splints`
    pub injury_type: String,
    /// e.g. `left_knee`
    pub affected_area: String,
    /// Severity at report time
    pub severity_level: InjurySeverity,
    /// Pain when first reported
    pub initial_pain_level: Option<u8>,
    /// Latest pain level
    pub current_pain_level: Option<u8>,
    /// When the injury happened
    pub injury_date: DateTime<Utc>,
    /// When it was reported
    pub reported_date: DateTime<Utc>,
    /// Estimated recovery
    pub expected_recovery_date: Option<DateTime<Utc>>,
    /// Set once, the first time status becomes recovered
    pub actual_recovery_date: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: InjuryStatus,
    /// Athlete's description
    pub description: Option<String>,
    /// Symptoms
    pub symptoms: Option<String>,
    /// Treatment plan
    pub treatment_plan: Option<String>,
    /// Free-form restrictions, e.g. `{"no_running": true}`
    pub activity_restrictions: Option<Value>,
    /// Coach notes on progress
    pub recovery_notes: Option<String>,
    /// Time of the latest timeline entry
    pub last_update_date: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl UserInjury {
    /// Whole days from injury to today
    #[must_use]
    pub fn days_since_injury(&self, today: NaiveDate) -> i64 {
        (today - self.injury_date.date_naive()).num_days()
    }

    /// Whole days from injury to recovery, when recovered
    #[must_use]
    pub fn days_to_recover(&self) -> Option<i64> {
        self.actual_recovery_date
            .map(|recovered| (recovered.date_naive() - self.injury_date.date_naive()).num_days())
    }
}

/// Immutable timeline entry for an injury
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjuryUpdate {
    /// Entry id
    pub id: String,
    /// Parent injury
    pub injury_id: String,
    /// Owning user id
    pub user_id: String,
    /// When the check-in happened
    pub update_date: DateTime<Utc>,
    /// Pain at check-in
    pub pain_level: Option<u8>,
    /// Status set at check-in
    pub status: Option<InjuryStatus>,
    /// Notes
    pub notes: Option<String>,
    /// Direction of change
    pub improvement_level: Option<ImprovementLevel>,
    /// Activities since the previous check-in
    pub activities_performed: Option<String>,
    /// What caused pain
    pub pain_triggers: Option<String>,
}

/// Input for reporting an injury
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewInjury {
    /// e.g. `runners_knee`
    pub injury_type: String,
    /// e.g. `right_ankle`
    pub affected_area: String,
    /// Severity
    pub severity_level: InjurySeverity,
    /// Pain 1..=10
    pub pain_level: u8,
    /// Description
    pub description: String,
    /// When it happened, defaults to now
    #[serde(default)]
    pub injury_date: Option<NaiveDate>,
    /// Symptoms
    #[serde(default)]
    pub symptoms: Option<String>,
    /// Treatment plan
    #[serde(default)]
    pub treatment_plan: Option<String>,
}

impl NewInjury {
    /// Validate field contents
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for blank type/area or an out-of-range pain level
    pub fn validate(&self) -> AppResult<()> {
        if self.injury_type.trim().is_empty() {
            return Err(AppError::invalid_input("injury_type is required"));
        }
        if self.affected_area.trim().is_empty() {
            return Err(AppError::invalid_input("affected_area is required"));
        }
        validate_pain_level(self.pain_level)?;
        Ok(())
    }
}

/// Check-in applied to an existing injury
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjuryChange {
    /// New pain level
    #[serde(default)]
    pub pain_level: Option<u8>,
    /// Direction of change
    #[serde(default)]
    pub improvement_level: Option<ImprovementLevel>,
    /// New status
    #[serde(default)]
    pub status: Option<InjuryStatus>,
    /// Notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Activities since the previous check-in
    #[serde(default)]
    pub activities_performed: Option<String>,
    /// What caused pain
    #[serde(default)]
    pub pain_triggers: Option<String>,
}

impl InjuryChange {
    /// Validate field contents
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for an out-of-range pain level
    pub fn validate(&self) -> AppResult<()> {
        if let Some(level) = self.pain_level {
            validate_pain_level(level)?;
        }
        Ok(())
    }
}
