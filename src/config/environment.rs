// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed server, database, LLM and auth configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{coaching_llm, defaults};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational output
    #[default]
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database file
    SQLite {
        /// Path of the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (tests and demos)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for non-`SQLite` connection strings
    pub fn parse_url(s: &str) -> Result<Self> {
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Err(anyhow!("Only SQLite databases are supported, got: {s}"));
        }

        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        let path_str = path_str.strip_prefix("//").unwrap_or(path_str);
        if path_str == ":memory:" || path_str.is_empty() {
            Ok(Self::Memory)
        } else {
            Ok(Self::SQLite {
                path: PathBuf::from(path_str),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/strideiq.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
    /// Run schema migrations on startup
    pub auto_migrate: bool,
}

/// Language model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the `OpenAI`-compatible API
    pub base_url: String,
    /// API key (never logged)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model used for plans and agent turns
    pub model: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for JWT validation (never logged)
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// JWT lifetime in hours
    pub jwt_expiry_hours: i64,
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of origins, or `*`
    pub allowed_origins: String,
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Language model configuration
    pub llm: LlmConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed or the database URL is unsupported
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let http_port = env_var_or("HTTP_PORT", &defaults::HTTP_PORT.to_string())
            .parse()
            .map_err(|e| anyhow!("Invalid HTTP_PORT value: {e}"))?;
        let jwt_expiry_hours = env_var_or(
            "JWT_EXPIRY_HOURS",
            &defaults::JWT_EXPIRY_HOURS.to_string(),
        )
        .parse()
        .map_err(|e| anyhow!("Invalid JWT_EXPIRY_HOURS value: {e}"))?;
        let auto_migrate = env_var_or("AUTO_MIGRATE", "true")
            .parse()
            .map_err(|e| anyhow!("Invalid AUTO_MIGRATE value: {e}"))?;

        let api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; coaching plans will use the rule-based fallback");
        }

        let config = Self {
            host: env_var_or("HOST", defaults::HOST),
            http_port,
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")),
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", defaults::DATABASE_URL))?,
                auto_migrate,
            },
            llm: LlmConfig {
                base_url: env_var_or("OPENAI_BASE_URL", defaults::OPENAI_BASE_URL),
                api_key,
                model: env_var_or("OPENAI_MODEL", coaching_llm::DEFAULT_MODEL),
            },
            auth: AuthConfig {
                jwt_secret: env_var_or("JWT_SECRET", ""),
                jwt_expiry_hours,
            },
            cors: CorsConfig {
                allowed_origins: env_var_or("CORS_ALLOWED_ORIGINS", "*"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when production runs without a JWT secret
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            if self.environment.is_production() {
                return Err(anyhow!("JWT_SECRET must be set in production"));
            }
            warn!("JWT_SECRET is empty; bearer tokens are signed with an empty key");
        }

        if self.auth.jwt_expiry_hours <= 0 {
            return Err(anyhow!("JWT_EXPIRY_HOURS must be positive"));
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "StrideIQ Server Configuration:\n\
             - Bind: {}:{}\n\
             - Environment: {}\n\
             - Log Level: {}\n\
             - Database: {}\n\
             - LLM: {} via {} ({})\n\
             - CORS Origins: {}",
            self.host,
            self.http_port,
            self.environment,
            self.log_level,
            self.database.url,
            self.llm.model,
            self.llm.base_url,
            if self.llm.api_key.is_some() {
                "configured"
            } else {
                "fallback only"
            },
            self.cors.allowed_origins,
        )
    }
}

/// Read an environment variable with a default
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
