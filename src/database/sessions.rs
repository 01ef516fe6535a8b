// ABOUTME: Database operations for coaching chat session metadata
// ABOUTME: Creates sessions on first message and refreshes last activity with owner scoping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::CoachingSession;

impl Database {
    /// Create the coaching sessions table
    pub(super) async fn migrate_sessions(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS coaching_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                last_active_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_coaching_sessions_user ON coaching_sessions(user_id, last_active_at)",
        ])
        .await
    }
}

/// Chat session metadata operations
pub struct SessionManager {
    pool: SqlitePool,
}

impl SessionManager {
    /// Create a new session manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a new session for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create(&self, user_id: &str) -> AppResult<CoachingSession> {
        let now = Utc::now();
        let session = CoachingSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            started_at: now,
            last_active_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO coaching_sessions (id, user_id, started_at, last_active_at)
            VALUES ($1, $2, $3, $3)
            ",
        )
        .bind(&session.id)
        .bind(user_id)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create coaching session: {e}")))?;

        Ok(session)
    }

    /// Refresh `last_active_at` of a session owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` when the session does not exist or belongs to someone else
    pub async fn touch(&self, id: &str, user_id: &str) -> AppResult<CoachingSession> {
        let row = sqlx::query(
            r"
            UPDATE coaching_sessions SET last_active_at = $3
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, started_at, last_active_at
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(format_timestamp(Utc::now()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update coaching session: {e}")))?;

        row.as_ref()
            .map(row_to_session)
            .transpose()?
            .ok_or_else(|| AppError::not_found("Coaching session").with_resource_id(id))
    }

    /// Sessions of a user, most recently active first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list(&self, user_id: &str, limit: i64) -> AppResult<Vec<CoachingSession>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, started_at, last_active_at
            FROM coaching_sessions
            WHERE user_id = $1
            ORDER BY last_active_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list coaching sessions: {e}")))?;

        rows.iter().map(row_to_session).collect()
    }
}

fn row_to_session(row: &SqliteRow) -> AppResult<CoachingSession> {
    let started_at: String = row.get("started_at");
    let last_active_at: String = row.get("last_active_at");
    Ok(CoachingSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        started_at: parse_timestamp(&started_at)?,
        last_active_at: parse_timestamp(&last_active_at)?,
    })
}
