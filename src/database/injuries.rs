// ABOUTME: Database operations for athlete injuries and their progress timeline
// ABOUTME: Report, owner-scoped status and pain updates with transition checks, active and history queries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{format_timestamp, parse_optional_timestamp, parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ImprovementLevel, InjuryChange, InjuryStatus, InjurySeverity, InjuryUpdate, NewInjury,
    UserInjury,
};

const COLUMNS: &str = "id, user_id, injury_type, affected_area, severity_level, initial_pain_level, \
    current_pain_level, injury_date, reported_date, expected_recovery_date, actual_recovery_date, status, \
    description, symptoms, treatment_plan, activity_restrictions, recovery_notes, last_update_date, \
    created_at, updated_at";

impl Database {
    /// Create injury tables
    pub(super) async fn migrate_injuries(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS user_injuries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                injury_type TEXT NOT NULL,
                affected_area TEXT NOT NULL,
                severity_level TEXT NOT NULL CHECK (severity_level IN ('mild', 'moderate', 'severe')),
                initial_pain_level INTEGER CHECK (initial_pain_level IS NULL OR initial_pain_level BETWEEN 1 AND 10),
                current_pain_level INTEGER CHECK (current_pain_level IS NULL OR current_pain_level BETWEEN 1 AND 10),
                injury_date TEXT NOT NULL,
                reported_date TEXT NOT NULL,
                expected_recovery_date TEXT,
                actual_recovery_date TEXT,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'recovering', 'recovered', 'chronic')),
                description TEXT,
                symptoms TEXT,
                treatment_plan TEXT,
                activity_restrictions TEXT,
                recovery_notes TEXT,
                last_update_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_user_injuries_status_user ON user_injuries(user_id, status)",
            "CREATE INDEX IF NOT EXISTS idx_user_injuries_date ON user_injuries(injury_date)",
            r"
            CREATE TABLE IF NOT EXISTS injury_updates (
                id TEXT PRIMARY KEY,
                injury_id TEXT NOT NULL REFERENCES user_injuries(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                update_date TEXT NOT NULL,
                pain_level INTEGER,
                status TEXT,
                notes TEXT,
                improvement_level TEXT,
                activities_performed TEXT,
                pain_triggers TEXT,
                created_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_injury_updates_injury_date ON injury_updates(injury_id, update_date)",
        ])
        .await
    }
}

/// Injury store
pub struct InjuryManager {
    pool: SqlitePool,
}

impl InjuryManager {
    /// Create a new injury manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a newly reported injury as active
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for bad fields, or a database error
    pub async fn report(&self, user_id: &str, injury: &NewInjury) -> AppResult<UserInjury> {
        injury.validate()?;

        let now = Utc::now();
        let injury_date = injury
            .injury_date
            .map_or(now, |day| day.and_time(NaiveTime::MIN).and_utc());
        let id = Uuid::new_v4().to_string();

        let sql = format!(
            r"
            INSERT INTO user_injuries (
                id, user_id, injury_type, affected_area, severity_level, initial_pain_level, current_pain_level,
                injury_date, reported_date, status, description, symptoms, treatment_plan, last_update_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, 'active', $9, $10, $11, $8, $8, $8)
            RETURNING {COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(&id)
            .bind(user_id)
            .bind(injury.injury_type.trim())
            .bind(injury.affected_area.trim())
            .bind(injury.severity_level.as_str())
            .bind(i64::from(injury.pain_level))
            .bind(format_timestamp(injury_date))
            .bind(format_timestamp(now))
            .bind(&injury.description)
            .bind(&injury.symptoms)
            .bind(&injury.treatment_plan)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to report injury: {e}")))?;

        info!(
            user.id = %user_id,
            injury.id = %id,
            injury.kind = %injury.injury_type,
            injury.pain = injury.pain_level,
            "Injury reported"
        );
        row_to_injury(&row)
    }

    /// Injury by id, only if owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, id: &str, user_id: &str) -> AppResult<Option<UserInjury>> {
        let sql = format!("SELECT {COLUMNS} FROM user_injuries WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get injury: {e}")))?;

        row.as_ref().map(row_to_injury).transpose()
    }

    /// Apply a check-in: validate the transition, update the injury and append a timeline entry
    ///
    /// Returns the updated injury and the names of the fields that changed.
    /// `recovery_date` is listed only the first time the injury becomes recovered.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown or foreign injury, `INVALID_INPUT`
    /// for a disallowed transition or pain level, or a database error
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        change: &InjuryChange,
    ) -> AppResult<(UserInjury, Vec<&'static str>)> {
        change.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let sql = format!("SELECT {COLUMNS} FROM user_injuries WHERE id = $1 AND user_id = $2");
        let current = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to get injury: {e}")))?
            .as_ref()
            .map(row_to_injury)
            .transpose()?
            .ok_or_else(|| AppError::not_found("Injury").with_resource_id(id))?;

        let mut updated_fields = Vec::new();
        if change.pain_level.is_some() {
            updated_fields.push("pain_level");
        }
        let mut recovery_date = current.actual_recovery_date;
        if let Some(next) = change.status {
            current.status.transition_to(next)?;
            updated_fields.push("status");
            if next == InjuryStatus::Recovered && recovery_date.is_none() {
                recovery_date = Some(Utc::now());
                updated_fields.push("recovery_date");
            }
        }

        let now = format_timestamp(Utc::now());
        let update_sql = format!(
            r"
            UPDATE user_injuries SET
                current_pain_level = COALESCE($3, current_pain_level),
                status = COALESCE($4, status),
                actual_recovery_date = $5,
                last_update_date = $6,
                updated_at = $6
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "
        );
        let row = sqlx::query(&update_sql)
            .bind(id)
            .bind(user_id)
            .bind(change.pain_level.map(i64::from))
            .bind(change.status.map(|s| s.as_str()))
            .bind(recovery_date.map(format_timestamp))
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to update injury: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO injury_updates (
                id, injury_id, user_id, update_date, pain_level, status, notes, improvement_level,
                activities_performed, pain_triggers, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $4)
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(user_id)
        .bind(&now)
        .bind(change.pain_level.map(i64::from))
        .bind(change.status.map(|s| s.as_str()))
        .bind(&change.notes)
        .bind(change.improvement_level.map(|l| l.as_str()))
        .bind(&change.activities_performed)
        .bind(&change.pain_triggers)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to record injury update: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit injury update: {e}")))?;

        Ok((row_to_injury(&row)?, updated_fields))
    }

    /// Active injuries, optionally with recovering ones, newest injury first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_active(
        &self,
        user_id: &str,
        include_recovering: bool,
    ) -> AppResult<Vec<UserInjury>> {
        let sql = format!(
            r"
            SELECT {COLUMNS} FROM user_injuries
            WHERE user_id = $1 AND (status = 'active' OR ($2 AND status = 'recovering'))
            ORDER BY injury_date DESC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(include_recovering)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list active injuries: {e}")))?;

        rows.iter().map(row_to_injury).collect()
    }

    /// Injuries that happened since `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_history(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        include_recovered: bool,
    ) -> AppResult<Vec<UserInjury>> {
        let sql = format!(
            r"
            SELECT {COLUMNS} FROM user_injuries
            WHERE user_id = $1 AND injury_date >= $2 AND ($3 OR status != 'recovered')
            ORDER BY injury_date DESC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(format_timestamp(since))
            .bind(include_recovered)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list injury history: {e}")))?;

        rows.iter().map(row_to_injury).collect()
    }

    /// Timeline of an injury, oldest entry first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn timeline(&self, injury_id: &str, user_id: &str) -> AppResult<Vec<InjuryUpdate>> {
        let rows = sqlx::query(
            r"
            SELECT id, injury_id, user_id, update_date, pain_level, status, notes, improvement_level,
                   activities_performed, pain_triggers
            FROM injury_updates
            WHERE injury_id = $1 AND user_id = $2
            ORDER BY update_date ASC
            ",
        )
        .bind(injury_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get injury timeline: {e}")))?;

        rows.iter()
            .map(|r| {
                let update_date: String = r.get("update_date");
                let pain: Option<i64> = r.get("pain_level");
                let status: Option<String> = r.get("status");
                let improvement: Option<String> = r.get("improvement_level");
                Ok(InjuryUpdate {
                    id: r.get("id"),
                    injury_id: r.get("injury_id"),
                    user_id: r.get("user_id"),
                    update_date: parse_timestamp(&update_date)?,
                    pain_level: pain.and_then(|p| u8::try_from(p).ok()),
                    status: status
                        .as_deref()
                        .map(str::parse::<InjuryStatus>)
                        .transpose()?,
                    notes: r.get("notes"),
                    improvement_level: improvement
                        .as_deref()
                        .map(str::parse::<ImprovementLevel>)
                        .transpose()?,
                    activities_performed: r.get("activities_performed"),
                    pain_triggers: r.get("pain_triggers"),
                })
            })
            .collect()
    }

    /// Delete an injury and, through the foreign key, its timeline
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown or foreign injury
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM user_injuries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete injury: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Injury").with_resource_id(id));
        }
        Ok(())
    }
}

fn row_to_injury(row: &SqliteRow) -> AppResult<UserInjury> {
    let severity: String = row.get("severity_level");
    let status: String = row.get("status");
    let initial_pain: Option<i64> = row.get("initial_pain_level");
    let current_pain: Option<i64> = row.get("current_pain_level");
    let injury_date: String = row.get("injury_date");
    let reported_date: String = row.get("reported_date");
    let expected: Option<String> = row.get("expected_recovery_date");
    let actual: Option<String> = row.get("actual_recovery_date");
    let restrictions: Option<String> = row.get("activity_restrictions");
    let last_update: Option<String> = row.get("last_update_date");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(UserInjury {
        id: row.get("id"),
        user_id: row.get("user_id"),
        injury_type: row.get("injury_type"),
        affected_area: row.get("affected_area"),
        severity_level: severity.parse::<InjurySeverity>()?,
        initial_pain_level: initial_pain.and_then(|p| u8::try_from(p).ok()),
        current_pain_level: current_pain.and_then(|p| u8::try_from(p).ok()),
        injury_date: parse_timestamp(&injury_date)?,
        reported_date: parse_timestamp(&reported_date)?,
        expected_recovery_date: parse_optional_timestamp(expected.as_deref())?,
        actual_recovery_date: parse_optional_timestamp(actual.as_deref())?,
        status: status.parse::<InjuryStatus>()?,
        description: row.get("description"),
        symptoms: row.get("symptoms"),
        treatment_plan: row.get("treatment_plan"),
        activity_restrictions: restrictions
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()?,
        recovery_notes: row.get("recovery_notes"),
        last_update_date: parse_optional_timestamp(last_update.as_deref())?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
