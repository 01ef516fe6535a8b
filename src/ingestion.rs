// ABOUTME: Validated, de-duplicated batch ingestion of wearable health data
// ABOUTME: Rejects out-of-range batches before any write and skips rows whose source id is already stored
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Health Data Ingestion
//!
//! Each batch belongs to one provider. A whole batch is validated first; a
//! single bad row rejects it with `INVALID_INPUT` and nothing is stored.
//! Rows carrying a `source_record_id` are skipped when that id is already
//! stored for the user and provider, or appeared earlier in the same batch.
//! Rows without one are always inserted.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Database, SampleKind, SyncStatus};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{HeartRateSample, SleepSession, StepMinute, Vo2MaxEstimate, WorkoutSession};

/// Accepted heart rate, beats per minute
pub const HEART_RATE_RANGE: RangeInclusive<i64> = 30..=250;
/// Accepted VO2max, mL/kg/min
pub const VO2_MAX_RANGE: RangeInclusive<f64> = 10.0..=90.0;
/// Accepted sleep score
pub const SLEEP_SCORE_RANGE: RangeInclusive<i64> = 0..=100;

const DEFAULT_HEART_RATE_CONTEXT: &str = "unknown";
const DEFAULT_VO2_METHOD: &str = "apple_health";

// ============================================================================
// Wire types
// ============================================================================

/// One heart-rate reading
#[derive(Debug, Clone, Deserialize)]
pub struct HeartRateInput {
    /// Capture time
    pub captured_at: DateTime<Utc>,
    /// Beats per minute, 30..=250
    pub bpm: i64,
    /// resting, workout, sleep or unknown
    #[serde(default)]
    pub context: Option<String>,
    /// Provider-side id
    #[serde(default)]
    pub source_record_id: Option<String>,
}

/// Steps counted in one minute
#[derive(Debug, Clone, Deserialize)]
pub struct StepInput {
    /// Start of the minute
    pub start_minute: DateTime<Utc>,
    /// Steps, never negative
    pub steps: i64,
    /// Provider-side id
    #[serde(default)]
    pub source_record_id: Option<String>,
}

/// One VO2max estimate
#[derive(Debug, Clone, Deserialize)]
pub struct Vo2MaxInput {
    /// Measurement time
    pub measured_at: DateTime<Utc>,
    /// mL/kg/min, 10..=90
    pub ml_per_kg_min: f64,
    /// How the value was estimated
    #[serde(default)]
    pub estimation_method: Option<String>,
    /// Provider-side id
    #[serde(default)]
    pub source_record_id: Option<String>,
}

/// One workout
#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutInput {
    /// e.g. running, walking
    pub activity_type: String,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in seconds
    pub duration_seconds: i64,
    /// Active calories
    #[serde(default)]
    pub calories: Option<f64>,
    /// Distance in miles
    #[serde(default)]
    pub distance_miles: Option<f64>,
    /// Average heart rate
    #[serde(default)]
    pub avg_heart_rate: Option<i64>,
    /// Peak heart rate
    #[serde(default)]
    pub max_heart_rate: Option<i64>,
    /// Provider-side id
    #[serde(default)]
    pub source_record_id: Option<String>,
}

/// One sleep session
#[derive(Debug, Clone, Deserialize)]
pub struct SleepInput {
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: DateTime<Utc>,
    /// Provider score, 0..=100
    #[serde(default)]
    pub score: Option<i64>,
    /// Provider-side id
    #[serde(default)]
    pub source_record_id: Option<String>,
}

/// Heart-rate, step or VO2max batch body
#[derive(Debug, Clone, Deserialize)]
pub struct SampleBatch<T> {
    /// Source provider, e.g. `apple_health`
    pub provider: String,
    /// Rows
    pub samples: Vec<T>,
}

/// Workout batch body
#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutBatch {
    /// Source provider
    pub provider: String,
    /// Rows
    pub workouts: Vec<WorkoutInput>,
}

/// Sleep batch body
#[derive(Debug, Clone, Deserialize)]
pub struct SleepBatch {
    /// Source provider
    pub provider: String,
    /// Rows
    pub sessions: Vec<SleepInput>,
}

/// Counts reported for every batch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResult {
    /// Rows in the request
    pub total_received: usize,
    /// Rows written
    pub total_stored: usize,
    /// Rows skipped as already known
    pub duplicates_skipped: usize,
}

// ============================================================================
// Validation
// ============================================================================

fn validate_provider(provider: &str) -> AppResult<String> {
    let provider = provider.trim();
    if provider.is_empty() {
        return Err(AppError::invalid_input("provider is required"));
    }
    Ok(provider.to_owned())
}

fn reject(index: usize, reason: &str) -> AppError {
    AppError::invalid_input(format!("Row {index}: {reason}"))
}

fn check_heart_rate(index: usize, bpm: i64) -> AppResult<u32> {
    if !HEART_RATE_RANGE.contains(&bpm) {
        return Err(reject(
            index,
            &format!("heart rate {bpm} outside 30-250 bpm"),
        ));
    }
    u32::try_from(bpm).map_err(|_| reject(index, "heart rate out of range"))
}

fn check_optional_heart_rate(index: usize, bpm: Option<i64>) -> AppResult<Option<u32>> {
    bpm.map(|b| check_heart_rate(index, b)).transpose()
}

/// Check every heart-rate row
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming the first row outside 30..=250 bpm
pub fn validate_heart_rate(samples: &[HeartRateInput]) -> AppResult<()> {
    for (index, sample) in samples.iter().enumerate() {
        check_heart_rate(index, sample.bpm)?;
    }
    Ok(())
}

/// Check every step row
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming the first negative count
pub fn validate_steps(samples: &[StepInput]) -> AppResult<()> {
    for (index, sample) in samples.iter().enumerate() {
        if sample.steps < 0 {
            return Err(reject(index, "steps cannot be negative"));
        }
    }
    Ok(())
}

/// Check every VO2max row
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming the first value outside 10..=90
pub fn validate_vo2max(samples: &[Vo2MaxInput]) -> AppResult<()> {
    for (index, sample) in samples.iter().enumerate() {
        if !VO2_MAX_RANGE.contains(&sample.ml_per_kg_min) {
            return Err(reject(
                index,
                &format!("VO2max {} outside 10-90", sample.ml_per_kg_min),
            ));
        }
    }
    Ok(())
}

/// Check every workout row
///
/// # Errors
///
/// Returns `INVALID_INPUT` for a blank activity, negative duration or bad heart rate
pub fn validate_workouts(workouts: &[WorkoutInput]) -> AppResult<()> {
    for (index, workout) in workouts.iter().enumerate() {
        if workout.activity_type.trim().is_empty() {
            return Err(reject(index, "activity_type is required"));
        }
        if workout.duration_seconds < 0 {
            return Err(reject(index, "duration_seconds cannot be negative"));
        }
        if workout.end_time.is_some_and(|end| end < workout.start_time) {
            return Err(reject(index, "end_time is before start_time"));
        }
        check_optional_heart_rate(index, workout.avg_heart_rate)?;
        check_optional_heart_rate(index, workout.max_heart_rate)?;
    }
    Ok(())
}

/// Check every sleep row
///
/// # Errors
///
/// Returns `INVALID_INPUT` for an inverted time range or a score outside 0..=100
pub fn validate_sleep(sessions: &[SleepInput]) -> AppResult<()> {
    for (index, session) in sessions.iter().enumerate() {
        if session.end_time < session.start_time {
            return Err(reject(index, "end_time is before start_time"));
        }
        if session.score.is_some_and(|s| !SLEEP_SCORE_RANGE.contains(&s)) {
            return Err(reject(index, "score must be between 0 and 100"));
        }
    }
    Ok(())
}

// ============================================================================
// De-duplication
// ============================================================================

/// Drop rows whose source id is in `known` or repeats earlier in the batch
///
/// Returns the kept rows and the number skipped.
pub fn dedupe<T, F>(rows: Vec<T>, known: &HashSet<String>, source_id: F) -> (Vec<T>, usize)
where
    F: Fn(&T) -> Option<&str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let total = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter(|row| match source_id(row) {
            Some(id) if known.contains(id) => false,
            Some(id) => seen.insert(id.to_owned()),
            None => true,
        })
        .collect();
    let skipped = total - kept.len();
    (kept, skipped)
}

fn source_id(raw: Option<&String>) -> Option<&str> {
    raw.map(String::as_str).map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// Service
// ============================================================================

/// Writes validated batches for one user at a time
#[derive(Clone)]
pub struct HealthIngestionService {
    database: Database,
}

impl HealthIngestionService {
    /// Create the service over a database handle
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    async fn known_ids(
        &self,
        kind: SampleKind,
        user_id: &str,
        provider: &str,
    ) -> AppResult<HashSet<String>> {
        self.database
            .health_data()
            .existing_source_ids(kind, user_id, provider)
            .await
    }

    fn finish(
        kind: SampleKind,
        user_id: &str,
        provider: &str,
        received: usize,
        stored: u64,
        skipped: usize,
    ) -> BatchResult {
        let stored = usize::try_from(stored).unwrap_or(usize::MAX);
        AppLogger::log_ingestion_batch(user_id, kind.as_str(), provider, received, stored);
        BatchResult {
            total_received: received,
            total_stored: stored,
            duplicates_skipped: skipped + received.saturating_sub(stored + skipped),
        }
    }

    /// Store a heart-rate batch
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad row, or a database error
    pub async fn ingest_heart_rate(
        &self,
        user_id: &str,
        batch: SampleBatch<HeartRateInput>,
    ) -> AppResult<BatchResult> {
        let provider = validate_provider(&batch.provider)?;
        validate_heart_rate(&batch.samples)?;
        let received = batch.samples.len();
        let known = self.known_ids(SampleKind::HeartRate, user_id, &provider).await?;
        let (rows, skipped) = dedupe(batch.samples, &known, |s| source_id(s.source_record_id.as_ref()));

        let samples: Vec<HeartRateSample> = rows
            .into_iter()
            .map(|s| HeartRateSample {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                provider: provider.clone(),
                source_record_id: s.source_record_id,
                captured_at: s.captured_at,
                bpm: u32::try_from(s.bpm).unwrap_or_default(),
                context: Some(s.context.unwrap_or_else(|| DEFAULT_HEART_RATE_CONTEXT.to_owned())),
            })
            .collect();
        let stored = self
            .database
            .health_data()
            .insert_heart_rate_samples(&samples)
            .await?;
        Ok(Self::finish(SampleKind::HeartRate, user_id, &provider, received, stored, skipped))
    }

    /// Store a per-minute step batch
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad row, or a database error
    pub async fn ingest_steps(
        &self,
        user_id: &str,
        batch: SampleBatch<StepInput>,
    ) -> AppResult<BatchResult> {
        let provider = validate_provider(&batch.provider)?;
        validate_steps(&batch.samples)?;
        let received = batch.samples.len();
        let known = self.known_ids(SampleKind::Steps, user_id, &provider).await?;
        let (rows, skipped) = dedupe(batch.samples, &known, |s| source_id(s.source_record_id.as_ref()));

        let samples: Vec<StepMinute> = rows
            .into_iter()
            .map(|s| StepMinute {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                provider: provider.clone(),
                source_record_id: s.source_record_id,
                start_minute: s.start_minute,
                steps: s.steps,
            })
            .collect();
        let stored = self.database.health_data().insert_step_minutes(&samples).await?;
        Ok(Self::finish(SampleKind::Steps, user_id, &provider, received, stored, skipped))
    }

    /// Store a VO2max batch
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad row, or a database error
    pub async fn ingest_vo2max(
        &self,
        user_id: &str,
        batch: SampleBatch<Vo2MaxInput>,
    ) -> AppResult<BatchResult> {
        let provider = validate_provider(&batch.provider)?;
        validate_vo2max(&batch.samples)?;
        let received = batch.samples.len();
        let known = self.known_ids(SampleKind::Vo2Max, user_id, &provider).await?;
        let (rows, skipped) = dedupe(batch.samples, &known, |s| source_id(s.source_record_id.as_ref()));

        let samples: Vec<Vo2MaxEstimate> = rows
            .into_iter()
            .map(|s| Vo2MaxEstimate {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                provider: provider.clone(),
                source_record_id: s.source_record_id,
                measured_at: s.measured_at,
                ml_per_kg_min: s.ml_per_kg_min,
                estimation_method: Some(
                    s.estimation_method
                        .unwrap_or_else(|| DEFAULT_VO2_METHOD.to_owned()),
                ),
            })
            .collect();
        let stored = self
            .database
            .health_data()
            .insert_vo2max_estimates(&samples)
            .await?;
        Ok(Self::finish(SampleKind::Vo2Max, user_id, &provider, received, stored, skipped))
    }

    /// Store a workout batch
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad row, or a database error
    pub async fn ingest_workouts(
        &self,
        user_id: &str,
        batch: WorkoutBatch,
    ) -> AppResult<BatchResult> {
        let provider = validate_provider(&batch.provider)?;
        validate_workouts(&batch.workouts)?;
        let received = batch.workouts.len();
        let known = self.known_ids(SampleKind::Workouts, user_id, &provider).await?;
        let (rows, skipped) = dedupe(batch.workouts, &known, |w| source_id(w.source_record_id.as_ref()));

        let workouts: Vec<WorkoutSession> = rows
            .into_iter()
            .map(|w| WorkoutSession {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                provider: provider.clone(),
                source_record_id: w.source_record_id,
                activity_type: w.activity_type.trim().to_owned(),
                start_time: w.start_time,
                end_time: w.end_time,
                duration_seconds: w.duration_seconds,
                calories: w.calories,
                distance_miles: w.distance_miles,
                avg_heart_rate: w.avg_heart_rate.and_then(|b| u32::try_from(b).ok()),
                max_heart_rate: w.max_heart_rate.and_then(|b| u32::try_from(b).ok()),
            })
            .collect();
        let stored = self.database.health_data().insert_workouts(&workouts).await?;
        Ok(Self::finish(SampleKind::Workouts, user_id, &provider, received, stored, skipped))
    }

    /// Store a sleep batch
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad row, or a database error
    pub async fn ingest_sleep(&self, user_id: &str, batch: SleepBatch) -> AppResult<BatchResult> {
        let provider = validate_provider(&batch.provider)?;
        validate_sleep(&batch.sessions)?;
        let received = batch.sessions.len();
        let known = self.known_ids(SampleKind::Sleep, user_id, &provider).await?;
        let (rows, skipped) = dedupe(batch.sessions, &known, |s| source_id(s.source_record_id.as_ref()));

        let sessions: Vec<SleepSession> = rows
            .into_iter()
            .map(|s| SleepSession {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_owned(),
                provider: provider.clone(),
                source_record_id: s.source_record_id,
                start_time: s.start_time,
                end_time: s.end_time,
                duration_s: (s.end_time - s.start_time).num_seconds(),
                score: s.score.and_then(|v| u32::try_from(v).ok()),
            })
            .collect();
        let stored = self
            .database
            .health_data()
            .insert_sleep_sessions(&sessions)
            .await?;
        Ok(Self::finish(SampleKind::Sleep, user_id, &provider, received, stored, skipped))
    }

    /// Record counts and newest timestamps for every sample kind
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn sync_status(&self, user_id: &str) -> AppResult<Vec<SyncStatus>> {
        self.database.health_data().sync_status(user_id).await
    }
}
