// ABOUTME: Database operations for daily coaching recommendations and their compliance lifecycle
// ABOUTME: Upsert per user and day, owner-scoped partial updates, recency listing and pending-plan checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{elapsed_ms, format_date, format_timestamp, parse_date, parse_timestamp, Database};
use crate::coaching::extraction::extract_workout_details;
use crate::constants::recommendations::LIST_RECENT_CAP;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{
    CoachingRecommendation, RecommendationDraft, RecommendationStatus, RecommendationUpdate,
    WorkoutDetails, WorkoutType,
};

const COLUMNS: &str = "id, user_id, recommendation_date, recommendation_day, todays_training, \
    nutrition_fueling, recovery_protocol, reasoning, workout_type, duration_minutes, intensity_zone, \
    heart_rate_range, status, actual_workout_id, compliance_notes, created_at, updated_at";

impl Database {
    /// Create the coaching recommendations table
    pub(super) async fn migrate_recommendations(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS coaching_recommendations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                recommendation_date TEXT NOT NULL,
                recommendation_day TEXT NOT NULL,
                todays_training TEXT NOT NULL DEFAULT '',
                nutrition_fueling TEXT NOT NULL DEFAULT '',
                recovery_protocol TEXT NOT NULL DEFAULT '',
                reasoning TEXT NOT NULL DEFAULT '',
                workout_type TEXT CHECK (workout_type IS NULL OR workout_type IN ('run', 'walk', 'cycling', 'rest', 'interval')),
                duration_minutes INTEGER,
                intensity_zone TEXT,
                heart_rate_range TEXT,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed', 'skipped', 'partial')),
                actual_workout_id TEXT,
                compliance_notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, recommendation_day)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_coaching_rec_user_date ON coaching_recommendations(user_id, recommendation_date)",
            "CREATE INDEX IF NOT EXISTS idx_coaching_rec_user_status ON coaching_recommendations(user_id, status)",
        ])
        .await
    }
}

/// Recommendation store
pub struct RecommendationManager {
    pool: SqlitePool,
}

impl RecommendationManager {
    /// Create a new recommendation manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist today's (UTC) plan for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create(
        &self,
        user_id: &str,
        draft: &RecommendationDraft,
    ) -> AppResult<CoachingRecommendation> {
        let now = Utc::now();
        self.create_for_day(user_id, draft, now.date_naive(), now)
            .await
    }

    /// Persist today's (UTC) plan with structured fields supplied by the caller
    ///
    /// The draft text is stored as-is and `details` replaces text extraction,
    /// so the row is written in a single statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_with_details(
        &self,
        user_id: &str,
        draft: &RecommendationDraft,
        details: &WorkoutDetails,
    ) -> AppResult<CoachingRecommendation> {
        let now = Utc::now();
        self.upsert(user_id, draft, details, now.date_naive(), now)
            .await
    }

    /// Persist the plan for `day`, replacing any existing plan for that day
    ///
    /// Extracted workout fields are recomputed from the new text. A replaced
    /// row starts over as `pending` with its compliance link cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_for_day(
        &self,
        user_id: &str,
        draft: &RecommendationDraft,
        day: NaiveDate,
        generated_at: DateTime<Utc>,
    ) -> AppResult<CoachingRecommendation> {
        let details = extract_workout_details(&draft.todays_training);
        self.upsert(user_id, draft, &details, day, generated_at)
            .await
    }

    async fn upsert(
        &self,
        user_id: &str,
        draft: &RecommendationDraft,
        details: &WorkoutDetails,
        day: NaiveDate,
        generated_at: DateTime<Utc>,
    ) -> AppResult<CoachingRecommendation> {
        let started = Instant::now();
        let now = format_timestamp(Utc::now());

        let sql = format!(
            r"
            INSERT INTO coaching_recommendations (
                id, user_id, recommendation_date, recommendation_day, todays_training, nutrition_fueling,
                recovery_protocol, reasoning, workout_type, duration_minutes, intensity_zone, heart_rate_range,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', $13, $13)
            ON CONFLICT (user_id, recommendation_day) DO UPDATE SET
                recommendation_date = excluded.recommendation_date,
                todays_training = excluded.todays_training,
                nutrition_fueling = excluded.nutrition_fueling,
                recovery_protocol = excluded.recovery_protocol,
                reasoning = excluded.reasoning,
                workout_type = excluded.workout_type,
                duration_minutes = excluded.duration_minutes,
                intensity_zone = excluded.intensity_zone,
                heart_rate_range = excluded.heart_rate_range,
                status = 'pending',
                actual_workout_id = NULL,
                compliance_notes = NULL,
                updated_at = excluded.updated_at
            RETURNING {COLUMNS}
            "
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(format_timestamp(generated_at))
            .bind(format_date(day))
            .bind(&draft.todays_training)
            .bind(&draft.nutrition_fueling)
            .bind(&draft.recovery_protocol)
            .bind(&draft.reasoning)
            .bind(details.workout_type.map(|t| t.as_str()))
            .bind(details.duration_minutes.map(i64::from))
            .bind(&details.intensity_zone)
            .bind(&details.heart_rate_range)
            .bind(&now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to save recommendation: {e}")))?;

        AppLogger::log_database_operation(
            "upsert",
            "coaching_recommendations",
            true,
            elapsed_ms(started),
        );
        row_to_recommendation(&row)
    }

    /// Today's (UTC) plan, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_today(&self, user_id: &str) -> AppResult<Option<CoachingRecommendation>> {
        self.get_for_day(user_id, Utc::now().date_naive()).await
    }

    /// Plan for a calendar day, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> AppResult<Option<CoachingRecommendation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM coaching_recommendations WHERE user_id = $1 AND recommendation_day = $2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(format_date(day))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get recommendation: {e}")))?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    /// Plan by id, only if owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_by_id(
        &self,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<CoachingRecommendation>> {
        let sql =
            format!("SELECT {COLUMNS} FROM coaching_recommendations WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get recommendation: {e}")))?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    /// Newest plan of any day
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn latest(&self, user_id: &str) -> AppResult<Option<CoachingRecommendation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM coaching_recommendations WHERE user_id = $1 ORDER BY recommendation_date DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get latest recommendation: {e}")))?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    /// Apply a partial update to a plan owned by `user_id`
    ///
    /// Unset fields keep their values; `updated_at` always moves.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` when the plan does not exist or belongs to someone else
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        update: &RecommendationUpdate,
    ) -> AppResult<CoachingRecommendation> {
        let sql = format!(
            r"
            UPDATE coaching_recommendations SET
                todays_training = COALESCE($3, todays_training),
                nutrition_fueling = COALESCE($4, nutrition_fueling),
                recovery_protocol = COALESCE($5, recovery_protocol),
                reasoning = COALESCE($6, reasoning),
                workout_type = COALESCE($7, workout_type),
                duration_minutes = COALESCE($8, duration_minutes),
                intensity_zone = COALESCE($9, intensity_zone),
                heart_rate_range = COALESCE($10, heart_rate_range),
                status = COALESCE($11, status),
                compliance_notes = COALESCE($12, compliance_notes),
                updated_at = $13
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&update.todays_training)
            .bind(&update.nutrition_fueling)
            .bind(&update.recovery_protocol)
            .bind(&update.reasoning)
            .bind(update.workout_type.map(|t| t.as_str()))
            .bind(update.duration_minutes.map(i64::from))
            .bind(&update.intensity_zone)
            .bind(&update.heart_rate_range)
            .bind(update.status.map(|s| s.as_str()))
            .bind(&update.compliance_notes)
            .bind(format_timestamp(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update recommendation: {e}")))?;

        match row {
            Some(row) => row_to_recommendation(&row),
            None => Err(AppError::not_found("Recommendation")
                .with_resource_id(id)
                .with_user_id(user_id)),
        }
    }

    /// Plans from the last `days` days, newest first, at most ten
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_recent(
        &self,
        user_id: &str,
        days: i64,
    ) -> AppResult<Vec<CoachingRecommendation>> {
        self.list_since(user_id, Utc::now() - Duration::days(days), LIST_RECENT_CAP)
            .await
    }

    /// Plans generated at or after `since`, newest first, capped at ten rows
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<CoachingRecommendation>> {
        let sql = format!(
            r"
            SELECT {COLUMNS} FROM coaching_recommendations
            WHERE user_id = $1 AND recommendation_date >= $2
            ORDER BY recommendation_date DESC
            LIMIT $3
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(format_timestamp(since))
            .bind(limit.clamp(0, LIST_RECENT_CAP))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list recommendations: {e}")))?;

        rows.iter().map(row_to_recommendation).collect()
    }

    /// Plans whose calendar day falls within `from..=to`, newest day first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_between_days(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<CoachingRecommendation>> {
        let sql = format!(
            r"
            SELECT {COLUMNS} FROM coaching_recommendations
            WHERE user_id = $1 AND recommendation_day >= $2 AND recommendation_day <= $3
            ORDER BY recommendation_day DESC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(format_date(from))
            .bind(format_date(to))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list recommendations: {e}")))?;

        rows.iter().map(row_to_recommendation).collect()
    }

    /// Number of plans the user has completed
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn completed_count(&self, user_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS completed FROM coaching_recommendations WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count completed plans: {e}")))?;

        Ok(row.get("completed"))
    }

    /// Calendar days with a completed plan, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn completed_days(&self, user_id: &str, limit: i64) -> AppResult<Vec<NaiveDate>> {
        let rows = sqlx::query(
            r"
            SELECT recommendation_day FROM coaching_recommendations
            WHERE user_id = $1 AND status = 'completed'
            ORDER BY recommendation_day DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list completed days: {e}")))?;

        rows.iter()
            .map(|row| {
                let day: String = row.get("recommendation_day");
                parse_date(&day)
            })
            .collect()
    }

    /// The pending plan for a calendar day, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn find_pending_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> AppResult<Option<CoachingRecommendation>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM coaching_recommendations WHERE user_id = $1 AND recommendation_day = $2 AND status = 'pending'"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(format_date(day))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find pending recommendation: {e}")))?;

        row.as_ref().map(row_to_recommendation).transpose()
    }

    /// Record a compliance decision, only while the plan is still pending
    ///
    /// Returns `false` when another writer already moved the plan out of pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn apply_compliance(
        &self,
        id: &str,
        status: RecommendationStatus,
        notes: &str,
        actual_workout_id: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE coaching_recommendations
            SET status = $2, compliance_notes = $3, actual_workout_id = $4, updated_at = $5
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(notes)
        .bind(actual_workout_id)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record compliance: {e}")))?;

        Ok(result.rows_affected() == 1)
    }
}

fn row_to_recommendation(row: &SqliteRow) -> AppResult<CoachingRecommendation> {
    let recommendation_date: String = row.get("recommendation_date");
    let recommendation_day: String = row.get("recommendation_day");
    let workout_type: Option<String> = row.get("workout_type");
    let duration: Option<i64> = row.get("duration_minutes");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(CoachingRecommendation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        recommendation_date: parse_timestamp(&recommendation_date)?,
        recommendation_day: parse_date(&recommendation_day)?,
        todays_training: row.get("todays_training"),
        nutrition_fueling: row.get("nutrition_fueling"),
        recovery_protocol: row.get("recovery_protocol"),
        reasoning: row.get("reasoning"),
        workout_type: workout_type
            .as_deref()
            .map(str::parse::<WorkoutType>)
            .transpose()?,
        duration_minutes: duration.and_then(|d| u32::try_from(d).ok()),
        intensity_zone: row.get("intensity_zone"),
        heart_rate_range: row.get("heart_rate_range"),
        status: status.parse::<RecommendationStatus>()?,
        actual_workout_id: row.get("actual_workout_id"),
        compliance_notes: row.get("compliance_notes"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
