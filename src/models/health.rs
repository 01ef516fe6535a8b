// ABOUTME: Wearable health sample models and the daily aggregates derived from them
// ABOUTME: Heart rate, steps, VO2max estimates, workout and sleep sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single heart-rate sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartRateSample {
    /// Sample id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Source provider, e.g. `apple_health`
    pub provider: String,
    /// Provider-side id used for deduplication
    pub source_record_id: Option<String>,
    /// Capture time
    pub captured_at: DateTime<Utc>,
    /// Beats per minute, 30..=250
    pub bpm: u32,
    /// `resting`, `workout`, `sleep` or `unknown`
    pub context: Option<String>,
}

/// Steps counted during one minute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepMinute {
    /// Sample id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Source provider
    pub provider: String,
    /// Provider-side id used for deduplication
    pub source_record_id: Option<String>,
    /// Start of the minute
    pub start_minute: DateTime<Utc>,
    /// Step count, never negative
    pub steps: i64,
}

/// A VO2max estimate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vo2MaxEstimate {
    /// Estimate id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Source provider
    pub provider: String,
    /// Provider-side id used for deduplication
    pub source_record_id: Option<String>,
    /// Measurement time
    pub measured_at: DateTime<Utc>,
    /// mL per kg per minute, 10..=90
    pub ml_per_kg_min: f64,
    /// How the provider estimated it
    pub estimation_method: Option<String>,
}

/// A logged workout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSession {
    /// Workout id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Source provider
    pub provider: String,
    /// Provider-side id used for deduplication
    pub source_record_id: Option<String>,
    /// Activity label as reported by the provider, e.g. `running`
    pub activity_type: String,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in seconds
    pub duration_seconds: i64,
    /// Active calories
    pub calories: Option<f64>,
    /// Distance in miles
    pub distance_miles: Option<f64>,
    /// Average heart rate
    pub avg_heart_rate: Option<u32>,
    /// Maximum heart rate
    pub max_heart_rate: Option<u32>,
}

impl WorkoutSession {
    /// Duration in minutes
    #[must_use]
    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }
}

/// A night (or nap) of sleep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SleepSession {
    /// Session id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Source provider
    pub provider: String,
    /// Provider-side id used for deduplication
    pub source_record_id: Option<String>,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: DateTime<Utc>,
    /// Duration in seconds
    pub duration_s: i64,
    /// Provider sleep score, 0..=100
    pub score: Option<u32>,
}

impl SleepSession {
    /// Duration in hours
    #[must_use]
    pub fn duration_hours(&self) -> f64 {
        self.duration_s as f64 / 3600.0
    }
}

/// Heart-rate statistics for one calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartRateDay {
    /// Calendar day (UTC)
    pub date: NaiveDate,
    /// Mean bpm
    pub avg_bpm: f64,
    /// Lowest bpm
    pub min_bpm: u32,
    /// Highest bpm
    pub max_bpm: u32,
    /// Number of samples averaged
    pub samples: usize,
}

/// Step total for one calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepDay {
    /// Calendar day (UTC)
    pub date: NaiveDate,
    /// Sum of minute step counts
    pub total_steps: i64,
}
