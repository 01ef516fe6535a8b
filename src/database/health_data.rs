// ABOUTME: Database operations for wearable health samples and their daily rollups
// ABOUTME: Transactional batch inserts with source-id deduplication plus the recency queries coaching reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{format_timestamp, parse_date, parse_optional_timestamp, parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    HeartRateSample, SleepSession, StepDay, StepMinute, Vo2MaxEstimate, WorkoutSession,
};

impl Database {
    /// Create health sample tables and their deduplication indexes
    pub(super) async fn migrate_health_data(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS heart_rate_samples (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                source_record_id TEXT,
                captured_at TEXT NOT NULL,
                bpm INTEGER NOT NULL CHECK (bpm BETWEEN 30 AND 250),
                context TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS step_minute (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                source_record_id TEXT,
                start_minute TEXT NOT NULL,
                steps INTEGER NOT NULL CHECK (steps >= 0)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS vo2max_estimates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                source_record_id TEXT,
                measured_at TEXT NOT NULL,
                ml_per_kg_min REAL NOT NULL CHECK (ml_per_kg_min BETWEEN 10 AND 90),
                estimation_method TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS workout_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                source_record_id TEXT,
                activity_type TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_seconds INTEGER NOT NULL CHECK (duration_seconds >= 0),
                calories REAL,
                distance_miles REAL,
                avg_heart_rate INTEGER,
                max_heart_rate INTEGER
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS sleep_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                source_record_id TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_s INTEGER NOT NULL CHECK (duration_s >= 0),
                score INTEGER CHECK (score IS NULL OR score BETWEEN 0 AND 100)
            )
            ",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_hr_source ON heart_rate_samples(user_id, provider, source_record_id)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_steps_source ON step_minute(user_id, provider, source_record_id)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_vo2_source ON vo2max_estimates(user_id, provider, source_record_id)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_workout_source ON workout_sessions(user_id, provider, source_record_id)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_sleep_source ON sleep_sessions(user_id, provider, source_record_id)",
            "CREATE INDEX IF NOT EXISTS idx_hr_user_time ON heart_rate_samples(user_id, captured_at)",
            "CREATE INDEX IF NOT EXISTS idx_steps_user_time ON step_minute(user_id, start_minute)",
            "CREATE INDEX IF NOT EXISTS idx_vo2_user_time ON vo2max_estimates(user_id, measured_at)",
            "CREATE INDEX IF NOT EXISTS idx_workout_user_time ON workout_sessions(user_id, start_time)",
            "CREATE INDEX IF NOT EXISTS idx_sleep_user_time ON sleep_sessions(user_id, start_time)",
        ])
        .await
    }
}

/// Category of wearable sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// Heart-rate samples
    HeartRate,
    /// Per-minute step counts
    Steps,
    /// VO2max estimates
    #[serde(rename = "vo2max")]
    Vo2Max,
    /// Workout sessions
    Workouts,
    /// Sleep sessions
    Sleep,
}

impl SampleKind {
    /// Every kind, in sync-status order
    pub const ALL: [Self; 5] = [
        Self::HeartRate,
        Self::Steps,
        Self::Vo2Max,
        Self::Workouts,
        Self::Sleep,
    ];

    /// Wire and log name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Steps => "steps",
            Self::Vo2Max => "vo2max",
            Self::Workouts => "workouts",
            Self::Sleep => "sleep",
        }
    }

    const fn table(self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate_samples",
            Self::Steps => "step_minute",
            Self::Vo2Max => "vo2max_estimates",
            Self::Workouts => "workout_sessions",
            Self::Sleep => "sleep_sessions",
        }
    }

    const fn time_column(self) -> &'static str {
        match self {
            Self::HeartRate => "captured_at",
            Self::Steps => "start_minute",
            Self::Vo2Max => "measured_at",
            Self::Workouts | Self::Sleep => "start_time",
        }
    }
}

impl Display for SampleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Stored record count and newest sample time for one kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatus {
    /// Sample category
    pub kind: SampleKind,
    /// Rows stored for the user
    pub record_count: i64,
    /// Time of the newest row
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// Health sample operations
pub struct HealthDataManager {
    pool: SqlitePool,
}

impl HealthDataManager {
    /// Create a new health data manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Source ids already stored for a user and provider
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn existing_source_ids(
        &self,
        kind: SampleKind,
        user_id: &str,
        provider: &str,
    ) -> AppResult<HashSet<String>> {
        let sql = format!(
            "SELECT source_record_id FROM {} WHERE user_id = $1 AND provider = $2 AND source_record_id IS NOT NULL",
            kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(provider)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to read {kind} source ids: {e}")))?;

        Ok(rows.iter().map(|r| r.get("source_record_id")).collect())
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))
    }

    async fn commit(tx: Transaction<'static, Sqlite>) -> AppResult<()> {
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit batch: {e}")))
    }

    /// Insert heart-rate samples in one transaction, returning the rows written
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case
    pub async fn insert_heart_rate_samples(&self, samples: &[HeartRateSample]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut stored = 0;
        for sample in samples {
            stored += sqlx::query(
                r"
                INSERT INTO heart_rate_samples (id, user_id, provider, source_record_id, captured_at, bpm, context)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&sample.id)
            .bind(&sample.user_id)
            .bind(&sample.provider)
            .bind(&sample.source_record_id)
            .bind(format_timestamp(sample.captured_at))
            .bind(i64::from(sample.bpm))
            .bind(&sample.context)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert heart rate sample: {e}")))?
            .rows_affected();
        }
        Self::commit(tx).await?;
        Ok(stored)
    }

    /// Insert step minutes in one transaction, returning the rows written
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case
    pub async fn insert_step_minutes(&self, samples: &[StepMinute]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut stored = 0;
        for sample in samples {
            stored += sqlx::query(
                r"
                INSERT INTO step_minute (id, user_id, provider, source_record_id, start_minute, steps)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&sample.id)
            .bind(&sample.user_id)
            .bind(&sample.provider)
            .bind(&sample.source_record_id)
            .bind(format_timestamp(sample.start_minute))
            .bind(sample.steps)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert step sample: {e}")))?
            .rows_affected();
        }
        Self::commit(tx).await?;
        Ok(stored)
    }

    /// Insert VO2max estimates in one transaction, returning the rows written
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case
    pub async fn insert_vo2max_estimates(&self, samples: &[Vo2MaxEstimate]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut stored = 0;
        for sample in samples {
            stored += sqlx::query(
                r"
                INSERT INTO vo2max_estimates (id, user_id, provider, source_record_id, measured_at, ml_per_kg_min, estimation_method)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&sample.id)
            .bind(&sample.user_id)
            .bind(&sample.provider)
            .bind(&sample.source_record_id)
            .bind(format_timestamp(sample.measured_at))
            .bind(sample.ml_per_kg_min)
            .bind(&sample.estimation_method)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert VO2max estimate: {e}")))?
            .rows_affected();
        }
        Self::commit(tx).await?;
        Ok(stored)
    }

    /// Insert workouts in one transaction, returning the rows written
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case
    pub async fn insert_workouts(&self, workouts: &[WorkoutSession]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut stored = 0;
        for workout in workouts {
            stored += sqlx::query(
                r"
                INSERT INTO workout_sessions (
                    id, user_id, provider, source_record_id, activity_type, start_time, end_time,
                    duration_seconds, calories, distance_miles, avg_heart_rate, max_heart_rate
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&workout.id)
            .bind(&workout.user_id)
            .bind(&workout.provider)
            .bind(&workout.source_record_id)
            .bind(&workout.activity_type)
            .bind(format_timestamp(workout.start_time))
            .bind(workout.end_time.map(format_timestamp))
            .bind(workout.duration_seconds)
            .bind(workout.calories)
            .bind(workout.distance_miles)
            .bind(workout.avg_heart_rate.map(i64::from))
            .bind(workout.max_heart_rate.map(i64::from))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert workout: {e}")))?
            .rows_affected();
        }
        Self::commit(tx).await?;
        Ok(stored)
    }

    /// Insert sleep sessions in one transaction, returning the rows written
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case
    pub async fn insert_sleep_sessions(&self, sessions: &[SleepSession]) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let mut stored = 0;
        for session in sessions {
            stored += sqlx::query(
                r"
                INSERT INTO sleep_sessions (id, user_id, provider, source_record_id, start_time, end_time, duration_s, score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(&session.provider)
            .bind(&session.source_record_id)
            .bind(format_timestamp(session.start_time))
            .bind(format_timestamp(session.end_time))
            .bind(session.duration_s)
            .bind(session.score.map(i64::from))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert sleep session: {e}")))?
            .rows_affected();
        }
        Self::commit(tx).await?;
        Ok(stored)
    }

    /// Record counts and newest timestamps per kind
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn sync_status(&self, user_id: &str) -> AppResult<Vec<SyncStatus>> {
        let mut statuses = Vec::with_capacity(SampleKind::ALL.len());
        for kind in SampleKind::ALL {
            let sql = format!(
                "SELECT COUNT(*) AS record_count, MAX({time}) AS latest FROM {table} WHERE user_id = $1",
                time = kind.time_column(),
                table = kind.table()
            );
            let row = sqlx::query(&sql)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to read {kind} sync status: {e}")))?;
            let latest: Option<String> = row.get("latest");
            statuses.push(SyncStatus {
                kind,
                record_count: row.get("record_count"),
                latest_timestamp: parse_optional_timestamp(latest.as_deref())?,
            });
        }
        Ok(statuses)
    }

    // ========================================================================
    // Heart Rate
    // ========================================================================

    /// Heart-rate samples captured since `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn heart_rate_samples_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<HeartRateSample>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, captured_at, bpm, context
            FROM heart_rate_samples
            WHERE user_id = $1 AND captured_at >= $2
            ORDER BY captured_at DESC
            LIMIT $3
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get heart rate samples: {e}")))?;

        rows.iter().map(row_to_heart_rate).collect()
    }

    /// Mean bpm over `[from, to)`, or `None` without samples
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn average_heart_rate_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Option<f64>> {
        let row = sqlx::query(
            r"
            SELECT AVG(bpm) AS avg_bpm
            FROM heart_rate_samples
            WHERE user_id = $1 AND captured_at >= $2 AND captured_at < $3
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(from))
        .bind(format_timestamp(to))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to average heart rate: {e}")))?;

        Ok(row.get("avg_bpm"))
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Daily step totals since `since`, newest day first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn daily_step_totals(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<StepDay>> {
        let rows = sqlx::query(
            r"
            SELECT substr(start_minute, 1, 10) AS day, SUM(steps) AS total_steps
            FROM step_minute
            WHERE user_id = $1 AND start_minute >= $2
            GROUP BY day
            ORDER BY day DESC
            LIMIT $3
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to total steps: {e}")))?;

        rows.iter()
            .map(|r| {
                let day: String = r.get("day");
                Ok(StepDay {
                    date: parse_date(&day)?,
                    total_steps: r.get("total_steps"),
                })
            })
            .collect()
    }

    /// Total steps over `[from, to)`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn total_steps_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(SUM(steps), 0) AS total_steps
            FROM step_minute
            WHERE user_id = $1 AND start_minute >= $2 AND start_minute < $3
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(from))
        .bind(format_timestamp(to))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to total steps: {e}")))?;

        Ok(row.get("total_steps"))
    }

    // ========================================================================
    // VO2max
    // ========================================================================

    /// Newest VO2max estimates first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn recent_vo2max(&self, user_id: &str, limit: i64) -> AppResult<Vec<Vo2MaxEstimate>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, measured_at, ml_per_kg_min, estimation_method
            FROM vo2max_estimates
            WHERE user_id = $1
            ORDER BY measured_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get VO2max estimates: {e}")))?;

        rows.iter().map(row_to_vo2).collect()
    }

    /// VO2max estimates measured since `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn vo2max_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Vo2MaxEstimate>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, measured_at, ml_per_kg_min, estimation_method
            FROM vo2max_estimates
            WHERE user_id = $1 AND measured_at >= $2
            ORDER BY measured_at ASC
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get VO2max history: {e}")))?;

        rows.iter().map(row_to_vo2).collect()
    }

    /// Highest VO2max ever recorded for the user
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn best_vo2max(&self, user_id: &str) -> AppResult<Option<f64>> {
        let row = sqlx::query(
            "SELECT MAX(ml_per_kg_min) AS best FROM vo2max_estimates WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get best VO2max: {e}")))?;

        Ok(row.get("best"))
    }

    // ========================================================================
    // Workouts
    // ========================================================================

    /// Newest workouts first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn recent_workouts(&self, user_id: &str, limit: i64) -> AppResult<Vec<WorkoutSession>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, activity_type, start_time, end_time,
                   duration_seconds, calories, distance_miles, avg_heart_rate, max_heart_rate
            FROM workout_sessions
            WHERE user_id = $1
            ORDER BY start_time DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get workouts: {e}")))?;

        rows.iter().map(row_to_workout).collect()
    }

    /// Workouts started since `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn workouts_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<WorkoutSession>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, activity_type, start_time, end_time,
                   duration_seconds, calories, distance_miles, avg_heart_rate, max_heart_rate
            FROM workout_sessions
            WHERE user_id = $1 AND start_time >= $2
            ORDER BY start_time DESC
            LIMIT $3
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get workouts: {e}")))?;

        rows.iter().map(row_to_workout).collect()
    }

    /// Workouts started in `[from, to)`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn workouts_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<WorkoutSession>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, activity_type, start_time, end_time,
                   duration_seconds, calories, distance_miles, avg_heart_rate, max_heart_rate
            FROM workout_sessions
            WHERE user_id = $1 AND start_time >= $2 AND start_time < $3
            ORDER BY start_time ASC
            ",
        )
        .bind(user_id)
        .bind(format_timestamp(from))
        .bind(format_timestamp(to))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get workouts: {e}")))?;

        rows.iter().map(row_to_workout).collect()
    }

    /// Longest single run distance on record, matching `run` or `running` in any case
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn longest_run_miles(&self, user_id: &str) -> AppResult<Option<f64>> {
        let row = sqlx::query(
            r"
            SELECT MAX(distance_miles) AS longest
            FROM workout_sessions
            WHERE user_id = $1 AND LOWER(activity_type) IN ('running', 'run')
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get longest run: {e}")))?;

        Ok(row.get("longest"))
    }

    // ========================================================================
    // Sleep
    // ========================================================================

    /// Newest sleep sessions first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn recent_sleep(&self, user_id: &str, limit: i64) -> AppResult<Vec<SleepSession>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, provider, source_record_id, start_time, end_time, duration_s, score
            FROM sleep_sessions
            WHERE user_id = $1
            ORDER BY start_time DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get sleep sessions: {e}")))?;

        rows.iter()
            .map(|r| {
                let start: String = r.get("start_time");
                let end: String = r.get("end_time");
                let score: Option<i64> = r.get("score");
                Ok(SleepSession {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    provider: r.get("provider"),
                    source_record_id: r.get("source_record_id"),
                    start_time: parse_timestamp(&start)?,
                    end_time: parse_timestamp(&end)?,
                    duration_s: r.get("duration_s"),
                    score: score.and_then(|s| u32::try_from(s).ok()),
                })
            })
            .collect()
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn row_to_heart_rate(row: &SqliteRow) -> AppResult<HeartRateSample> {
    let captured_at: String = row.get("captured_at");
    let bpm: i64 = row.get("bpm");
    Ok(HeartRateSample {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        source_record_id: row.get("source_record_id"),
        captured_at: parse_timestamp(&captured_at)?,
        bpm: u32::try_from(bpm)
            .map_err(|e| AppError::database(format!("Invalid stored bpm {bpm}: {e}")))?,
        context: row.get("context"),
    })
}

fn row_to_vo2(row: &SqliteRow) -> AppResult<Vo2MaxEstimate> {
    let measured_at: String = row.get("measured_at");
    Ok(Vo2MaxEstimate {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        source_record_id: row.get("source_record_id"),
        measured_at: parse_timestamp(&measured_at)?,
        ml_per_kg_min: row.get("ml_per_kg_min"),
        estimation_method: row.get("estimation_method"),
    })
}

fn row_to_workout(row: &SqliteRow) -> AppResult<WorkoutSession> {
    let start_time: String = row.get("start_time");
    let end_time: Option<String> = row.get("end_time");
    let avg_hr: Option<i64> = row.get("avg_heart_rate");
    let max_hr: Option<i64> = row.get("max_heart_rate");
    Ok(WorkoutSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        source_record_id: row.get("source_record_id"),
        activity_type: row.get("activity_type"),
        start_time: parse_timestamp(&start_time)?,
        end_time: parse_optional_timestamp(end_time.as_deref())?,
        duration_seconds: row.get("duration_seconds"),
        calories: row.get("calories"),
        distance_miles: row.get("distance_miles"),
        avg_heart_rate: avg_hr.and_then(|v| u32::try_from(v).ok()),
        max_heart_rate: max_hr.and_then(|v| u32::try_from(v).ok()),
    })
}
