// ABOUTME: SQLite persistence layer for athlete data, health samples, plans, injuries and chat sessions
// ABOUTME: Owns the connection pool, runs idempotent migrations and hands out per-area managers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Database Management
//!
//! A single `SQLite` pool shared by every request. Each area of the schema
//! lives in its own module with its own migration and a small manager type:
//!
//! - [`ProfileManager`]: profile, goals, preferences, weight, intentions, conditions
//! - [`HealthDataManager`]: heart rate, steps, VO2max, workouts, sleep
//! - [`RecommendationManager`]: daily coaching plans and their lifecycle
//! - [`InjuryManager`]: injuries and their progress timeline
//! - [`SessionManager`]: coaching chat session metadata
//!
//! Timestamps are stored as RFC 3339 UTC text with millisecond precision so
//! that lexical comparison in SQL matches chronological order.

mod health_data;
mod injuries;
mod profiles;
mod recommendations;
mod sessions;

pub use health_data::{HealthDataManager, SampleKind, SyncStatus};
pub use injuries::InjuryManager;
pub use profiles::ProfileManager;
pub use recommendations::RecommendationManager;
pub use sessions::SessionManager;

use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::fs;
use tracing::info;

use crate::config::DatabaseUrl;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;

/// Database handle shared across the server
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the configured database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails
    pub async fn new(url: &DatabaseUrl) -> AppResult<Self> {
        let db = Self::connect(url).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Connect without migrating
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be created or opened
    pub async fn connect(url: &DatabaseUrl) -> AppResult<Self> {
        if let DatabaseUrl::SQLite { path } = url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::config(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .map_err(|e| AppError::config(format!("Invalid database URL {url}: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so pin exactly one
        let pool_options = if url.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {url}: {e}")))?;

        info!("Connected to database: {url}");
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails
    pub async fn in_memory() -> AppResult<Self> {
        Self::new(&DatabaseUrl::Memory).await
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all schema migrations; safe to call repeatedly
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        let started = Instant::now();

        self.migrate_profiles().await?;
        self.migrate_health_data().await?;
        self.migrate_recommendations().await?;
        self.migrate_injuries().await?;
        self.migrate_sessions().await?;

        AppLogger::log_database_operation("migrate", "*", true, elapsed_ms(started));
        Ok(())
    }

    /// Execute a list of DDL statements in order
    async fn execute_ddl(&self, statements: &[&str]) -> AppResult<()> {
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }
        Ok(())
    }

    /// Profile and onboarding data
    #[must_use]
    pub fn profiles(&self) -> ProfileManager {
        ProfileManager::new(self.pool.clone())
    }

    /// Wearable samples
    #[must_use]
    pub fn health_data(&self) -> HealthDataManager {
        HealthDataManager::new(self.pool.clone())
    }

    /// Coaching plans
    #[must_use]
    pub fn recommendations(&self) -> RecommendationManager {
        RecommendationManager::new(self.pool.clone())
    }

    /// Injuries
    #[must_use]
    pub fn injuries(&self) -> InjuryManager {
        InjuryManager::new(self.pool.clone())
    }

    /// Chat session metadata
    #[must_use]
    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.pool.clone())
    }
}

// ============================================================================
// Column Encoding Helpers
// ============================================================================

/// Encode a timestamp for storage
#[must_use]
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp
///
/// # Errors
///
/// Returns `DATABASE_ERROR` when the column does not hold RFC 3339 text
pub fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid stored timestamp '{value}': {e}")))
}

/// Decode an optional stored timestamp
///
/// # Errors
///
/// Returns `DATABASE_ERROR` when a present value is malformed
pub fn parse_optional_timestamp(value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(parse_timestamp).transpose()
}

/// Encode a calendar day for storage
#[must_use]
pub fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// Decode a stored calendar day; accepts a full timestamp too
///
/// # Errors
///
/// Returns `DATABASE_ERROR` when the value does not start with `YYYY-MM-DD`
pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| AppError::database(format!("Invalid stored date '{value}': {e}")))
}

/// Milliseconds since `started`, saturating
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
