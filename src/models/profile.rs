// ABOUTME: Athlete profile models collected at onboarding and used for personalization
// ABOUTME: Profile, goals, training preferences, weight measurements, daily intentions and medical conditions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Demographic profile of an athlete
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    /// Owning user id
    pub user_id: String,
    /// First name used to address the athlete
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Free-form gender
    pub gender: Option<String>,
    /// Birth date
    pub birth_date: Option<NaiveDate>,
    /// Age in years
    pub age: Option<u32>,
    /// Height in inches
    pub height_inches: Option<f64>,
}

impl UserProfile {
    /// First name, or `None` when blank
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A fitness goal set by the athlete
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGoal {
    /// Goal id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Goal category, e.g. `lose_weight` or `run_marathon`
    pub goal_type: String,
    /// Free-text description
    pub description: Option<String>,
    /// Numeric target
    pub target_value: Option<f64>,
    /// Unit of the target
    pub target_unit: Option<String>,
    /// Target date
    pub target_date: Option<NaiveDate>,
    /// Inactive goals are ignored by coaching
    pub is_active: bool,
}

/// How and how often the athlete likes to train
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingPreferences {
    /// Owning user id
    pub user_id: String,
    /// Experience level, e.g. `beginner`
    pub training_level: String,
    /// Sessions per training day
    pub sessions_per_day: Option<u32>,
    /// Training days per week
    pub days_per_week: Option<u32>,
    /// Preferred time of day
    pub preferred_time_window: Option<String>,
}

/// A body weight reading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightMeasurement {
    /// Measurement id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Weight in pounds
    pub value_lbs: f64,
    /// When the weight was taken
    pub measured_at: DateTime<Utc>,
}

/// Whether the athlete wants to train on a given day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrainingIntention {
    /// Wants to train
    Yes,
    /// Rest day
    No,
    /// Undecided
    Maybe,
}

impl TrainingIntention {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Maybe => "maybe",
        }
    }

    /// Prompt phrasing of the intention
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Yes => "YES - wants to train today",
            Self::No => "NO - rest/recovery day",
            Self::Maybe => "MAYBE - flexible about training",
        }
    }
}

impl Display for TrainingIntention {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingIntention {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "maybe" => Ok(Self::Maybe),
            _ => Err(AppError::invalid_input(format!(
                "Invalid training intention: {s}"
            ))),
        }
    }
}

/// Training intention recorded for one calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyIntention {
    /// Owning user id
    pub user_id: String,
    /// Day the intention applies to
    pub intention_date: NaiveDate,
    /// The intention itself
    pub intention: TrainingIntention,
    /// Optional athlete notes
    pub notes: Option<String>,
}

/// An active medical condition relevant to training
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicalCondition {
    /// Condition name
    pub name: String,
    /// Optional notes
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intention_parsing_is_case_insensitive() {
        assert_eq!("YES".parse::<TrainingIntention>().unwrap(), TrainingIntention::Yes);
        assert!("sometimes".parse::<TrainingIntention>().is_err());
    }

    #[test]
    fn test_blank_first_name_is_absent() {
        let profile = UserProfile {
            first_name: Some("  ".to_owned()),
            ..UserProfile::default()
        };
        assert_eq!(profile.display_name(), None);
    }
}
