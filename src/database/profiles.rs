// ABOUTME: Database operations for athlete profile data used to personalize coaching
// ABOUTME: Profiles, goals, training preferences, weight, daily intentions and medical conditions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_date, format_timestamp, parse_date, parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    DailyIntention, MedicalCondition, TrainingIntention, TrainingPreferences, UserGoal,
    UserProfile, WeightMeasurement,
};

impl Database {
    /// Create profile and onboarding tables
    pub(super) async fn migrate_profiles(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                first_name TEXT,
                last_name TEXT,
                gender TEXT,
                birth_date TEXT,
                age INTEGER CHECK (age IS NULL OR age BETWEEN 0 AND 130),
                height_inches REAL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS user_goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_type TEXT NOT NULL,
                description TEXT,
                target_value REAL,
                target_unit TEXT,
                target_date TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_user_goals_user ON user_goals(user_id, is_active)",
            r"
            CREATE TABLE IF NOT EXISTS training_preferences (
                user_id TEXT PRIMARY KEY,
                training_level TEXT NOT NULL,
                sessions_per_day INTEGER,
                days_per_week INTEGER CHECK (days_per_week IS NULL OR days_per_week BETWEEN 0 AND 7),
                preferred_time_window TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS body_weight_measurements (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                value_lbs REAL NOT NULL CHECK (value_lbs > 0),
                measured_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_weight_user_time ON body_weight_measurements(user_id, measured_at)",
            r"
            CREATE TABLE IF NOT EXISTS user_daily_training_intentions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                intention_date TEXT NOT NULL,
                intention TEXT NOT NULL CHECK (intention IN ('yes', 'no', 'maybe')),
                notes TEXT,
                UNIQUE (user_id, intention_date)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS user_medical_conditions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                notes TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            ",
        ])
        .await
    }
}

/// Profile and onboarding data operations
pub struct ProfileManager {
    pool: SqlitePool,
}

impl ProfileManager {
    /// Create a new profile manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// Insert or replace the athlete profile
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_profile(&self, profile: &UserProfile) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_profiles (user_id, first_name, last_name, gender, birth_date, age, height_inches, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                gender = excluded.gender,
                birth_date = excluded.birth_date,
                age = excluded.age,
                height_inches = excluded.height_inches,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.gender)
        .bind(profile.birth_date.map(format_date))
        .bind(profile.age.map(i64::from))
        .bind(profile.height_inches)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save profile: {e}")))?;

        Ok(())
    }

    /// Get the athlete profile
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(
            r"
            SELECT user_id, first_name, last_name, gender, birth_date, age, height_inches
            FROM user_profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get profile: {e}")))?;

        row.map(|r| {
            let birth_date: Option<String> = r.get("birth_date");
            let age: Option<i64> = r.get("age");
            Ok(UserProfile {
                user_id: r.get("user_id"),
                first_name: r.get("first_name"),
                last_name: r.get("last_name"),
                gender: r.get("gender"),
                birth_date: birth_date.as_deref().map(parse_date).transpose()?,
                age: age.and_then(|a| u32::try_from(a).ok()),
                height_inches: r.get("height_inches"),
            })
        })
        .transpose()
    }

    // ========================================================================
    // Goals
    // ========================================================================

    /// Store a goal
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_goal(&self, goal: &UserGoal) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_goals (id, user_id, goal_type, description, target_value, target_unit, target_date, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&goal.id)
        .bind(&goal.user_id)
        .bind(&goal.goal_type)
        .bind(&goal.description)
        .bind(goal.target_value)
        .bind(&goal.target_unit)
        .bind(goal.target_date.map(format_date))
        .bind(goal.is_active)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add goal: {e}")))?;

        Ok(())
    }

    /// Active goals, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_active_goals(&self, user_id: &str) -> AppResult<Vec<UserGoal>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, goal_type, description, target_value, target_unit, target_date, is_active
            FROM user_goals
            WHERE user_id = $1 AND is_active = 1
            ORDER BY created_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list goals: {e}")))?;

        rows.iter()
            .map(|r| {
                let target_date: Option<String> = r.get("target_date");
                Ok(UserGoal {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    goal_type: r.get("goal_type"),
                    description: r.get("description"),
                    target_value: r.get("target_value"),
                    target_unit: r.get("target_unit"),
                    target_date: target_date.as_deref().map(parse_date).transpose()?,
                    is_active: r.get("is_active"),
                })
            })
            .collect()
    }

    // ========================================================================
    // Training Preferences
    // ========================================================================

    /// Insert or replace training preferences
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_training_preferences(&self, prefs: &TrainingPreferences) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO training_preferences (user_id, training_level, sessions_per_day, days_per_week, preferred_time_window)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                training_level = excluded.training_level,
                sessions_per_day = excluded.sessions_per_day,
                days_per_week = excluded.days_per_week,
                preferred_time_window = excluded.preferred_time_window
            ",
        )
        .bind(&prefs.user_id)
        .bind(&prefs.training_level)
        .bind(prefs.sessions_per_day.map(i64::from))
        .bind(prefs.days_per_week.map(i64::from))
        .bind(&prefs.preferred_time_window)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save training preferences: {e}")))?;

        Ok(())
    }

    /// Get training preferences
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_training_preferences(
        &self,
        user_id: &str,
    ) -> AppResult<Option<TrainingPreferences>> {
        let row = sqlx::query(
            r"
            SELECT user_id, training_level, sessions_per_day, days_per_week, preferred_time_window
            FROM training_preferences
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get training preferences: {e}")))?;

        Ok(row.map(|r| {
            let sessions: Option<i64> = r.get("sessions_per_day");
            let days: Option<i64> = r.get("days_per_week");
            TrainingPreferences {
                user_id: r.get("user_id"),
                training_level: r.get("training_level"),
                sessions_per_day: sessions.and_then(|v| u32::try_from(v).ok()),
                days_per_week: days.and_then(|v| u32::try_from(v).ok()),
                preferred_time_window: r.get("preferred_time_window"),
            }
        }))
    }

    // ========================================================================
    // Body Weight
    // ========================================================================

    /// Record a weight reading
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a non-positive weight, or a database error
    pub async fn record_weight(
        &self,
        user_id: &str,
        value_lbs: f64,
        measured_at: DateTime<Utc>,
    ) -> AppResult<WeightMeasurement> {
        if !value_lbs.is_finite() || value_lbs <= 0.0 {
            return Err(AppError::invalid_input(format!(
                "Weight must be positive, got {value_lbs}"
            )));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r"
            INSERT INTO body_weight_measurements (id, user_id, value_lbs, measured_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(value_lbs)
        .bind(format_timestamp(measured_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record weight: {e}")))?;

        Ok(WeightMeasurement {
            id,
            user_id: user_id.to_owned(),
            value_lbs,
            measured_at,
        })
    }

    /// Newest weight readings first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn recent_weights(
        &self,
        user_id: &str,
        limit: i64,
    ) -> AppResult<Vec<WeightMeasurement>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, value_lbs, measured_at
            FROM body_weight_measurements
            WHERE user_id = $1
            ORDER BY measured_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get weight history: {e}")))?;

        rows.iter().map(row_to_weight).collect()
    }

    // ========================================================================
    // Daily Training Intention
    // ========================================================================

    /// Set the intention for a day, replacing any earlier answer
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn set_daily_intention(&self, intention: &DailyIntention) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_daily_training_intentions (id, user_id, intention_date, intention, notes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, intention_date) DO UPDATE SET
                intention = excluded.intention,
                notes = excluded.notes
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&intention.user_id)
        .bind(format_date(intention.intention_date))
        .bind(intention.intention.as_str())
        .bind(&intention.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save training intention: {e}")))?;

        Ok(())
    }

    /// Intention recorded for a day
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored value is unknown
    pub async fn get_daily_intention(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> AppResult<Option<DailyIntention>> {
        let row = sqlx::query(
            r"
            SELECT user_id, intention_date, intention, notes
            FROM user_daily_training_intentions
            WHERE user_id = $1 AND intention_date = $2
            ",
        )
        .bind(user_id)
        .bind(format_date(day))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get training intention: {e}")))?;

        row.map(|r| {
            let intention: String = r.get("intention");
            let date: String = r.get("intention_date");
            Ok(DailyIntention {
                user_id: r.get("user_id"),
                intention_date: parse_date(&date)?,
                intention: intention.parse::<TrainingIntention>()?,
                notes: r.get("notes"),
            })
        })
        .transpose()
    }

    // ========================================================================
    // Medical Conditions
    // ========================================================================

    /// Record an active medical condition
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_medical_condition(
        &self,
        user_id: &str,
        name: &str,
        notes: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_medical_conditions (id, user_id, name, notes, is_active)
            VALUES ($1, $2, $3, $4, 1)
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(name)
        .bind(notes)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add medical condition: {e}")))?;

        Ok(())
    }

    /// Active medical conditions
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn active_medical_conditions(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<MedicalCondition>> {
        let rows = sqlx::query(
            r"
            SELECT name, notes
            FROM user_medical_conditions
            WHERE user_id = $1 AND is_active = 1
            ORDER BY name ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list medical conditions: {e}")))?;

        Ok(rows
            .iter()
            .map(|r| MedicalCondition {
                name: r.get("name"),
                notes: r.get("notes"),
            })
            .collect())
    }
}

fn row_to_weight(row: &SqliteRow) -> AppResult<WeightMeasurement> {
    let measured_at: String = row.get("measured_at");
    Ok(WeightMeasurement {
        id: row.get("id"),
        user_id: row.get("user_id"),
        value_lbs: row.get("value_lbs"),
        measured_at: parse_timestamp(&measured_at)?,
    })
}
