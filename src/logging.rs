// ABOUTME: Logging configuration and structured logging setup for the coaching backend
// ABOUTME: Configures log levels, output formats and structured field helpers for requests, LLM calls and agent tools
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Production-ready logging configuration with structured output

use std::env;
use std::io;

use anyhow::{anyhow, Result};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::constants::service_names;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Include thread information
    pub include_thread: bool,
    /// Include span open/close events
    pub include_spans: bool,
    /// Service name for structured logging
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (development, testing, production)
    pub environment: String,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `JSON` format for production logging
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact format for space-constrained environments
    Compact,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value, defaulting to pretty output
    #[must_use]
    pub fn from_str_or_default(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            include_thread: false,
            include_spans: false,
            service_name: service_names::STRIDEIQ_SERVER.into(),
            service_version: env!("CARGO_PKG_VERSION").to_owned(),
            environment: "development".into(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG")
            .or_else(|_| env::var("LOG_LEVEL"))
            .unwrap_or_else(|_| "info".into());
        let format = env::var("LOG_FORMAT")
            .map(|value| LogFormat::from_str_or_default(&value))
            .unwrap_or(LogFormat::Pretty);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_production = environment == "production";

        Self {
            level,
            format,
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_thread: is_production || env::var("LOG_INCLUDE_THREAD").is_ok(),
            include_spans: is_production || env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| service_names::STRIDEIQ_SERVER.into()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_owned()),
            environment,
        }
    }

    /// Build the environment filter with dependency noise reduction applied
    fn build_filter(&self) -> EnvFilter {
        let base = env::var("RUST_LOG").map_or_else(
            |_| EnvFilter::new(&self.level),
            |directive| EnvFilter::new(&directive),
        );

        let noise_rules = [
            "hyper=warn".to_owned(),
            "hyper::proto=warn".to_owned(),
            "reqwest=warn".to_owned(),
            "sqlx=warn".to_owned(),
            "sqlx::query=warn".to_owned(),
            "tower_http=info".to_owned(),
            format!("strideiq_server={}", self.level),
        ];

        noise_rules
            .iter()
            .fold(base, |filter, rule| match rule.parse::<Directive>() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            })
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber has already been installed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.build_filter());
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let installed = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .with_file(self.include_location)
                        .with_line_number(self.include_location)
                        .with_thread_ids(self.include_thread)
                        .with_thread_names(self.include_thread)
                        .with_target(true)
                        .with_writer(io::stdout)
                        .with_span_events(span_events)
                        .json(),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_file(self.include_location)
                        .with_line_number(self.include_location)
                        .with_thread_ids(self.include_thread)
                        .with_thread_names(self.include_thread)
                        .with_target(true)
                        .with_writer(io::stdout)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_file(false)
                        .with_line_number(false)
                        .with_target(false)
                        .with_writer(io::stdout)
                        .with_span_events(FmtSpan::NONE),
                )
                .try_init(),
        };

        installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;
        self.log_startup_info();
        Ok(())
    }

    /// Log structured startup information
    fn log_startup_info(&self) {
        info!(
            service.name = %self.service_name,
            service.version = %self.service_version,
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "StrideIQ server starting up"
        );

        let config_summary = json!({
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            },
            "logging": {
                "level": self.level,
                "format": format!("{:?}", self.format),
                "features": {
                    "location": self.include_location,
                    "thread": self.include_thread,
                    "spans": self.include_spans
                }
            }
        });

        info!("Logging configured: {config_summary}");
    }
}

/// Initialize logging from environment
///
/// # Errors
///
/// Returns an error if logging initialization fails
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Application-specific structured logging helpers
pub struct AppLogger;

impl AppLogger {
    /// Log `API` requests
    pub fn log_api_request(
        method: &str,
        path: &str,
        status: u16,
        duration_ms: u64,
        user_id: Option<&str>,
    ) {
        info!(
            http.method = %method,
            http.path = %path,
            http.status = %status,
            http.duration_ms = %duration_ms,
            user.id = user_id.unwrap_or("anonymous"),
            "HTTP request"
        );
    }

    /// Log database operations
    pub fn log_database_operation(operation: &str, table: &str, success: bool, duration_ms: u64) {
        info!(
            db.operation = %operation,
            db.table = %table,
            db.success = %success,
            db.duration_ms = %duration_ms,
            "Database operation"
        );
    }

    /// Log a language model call and whether the fallback plan was used
    pub fn log_llm_call(user_id: &str, model: &str, success: bool, duration_ms: u64, fallback: bool) {
        if success {
            info!(
                user.id = %user_id,
                llm.model = %model,
                llm.success = %success,
                llm.duration_ms = %duration_ms,
                llm.fallback = %fallback,
                "LLM call"
            );
        } else {
            warn!(
                user.id = %user_id,
                llm.model = %model,
                llm.success = %success,
                llm.duration_ms = %duration_ms,
                llm.fallback = %fallback,
                "LLM call failed"
            );
        }
    }

    /// Log a coaching agent tool invocation
    pub fn log_agent_tool_call(user_id: &str, session_id: &str, tool: &str, success: bool) {
        info!(
            user.id = %user_id,
            agent.session = %session_id,
            agent.tool = %tool,
            agent.success = %success,
            "Agent tool call"
        );
    }

    /// Log the ingestion outcome of a health data batch
    pub fn log_ingestion_batch(
        user_id: &str,
        kind: &str,
        provider: &str,
        received: usize,
        stored: usize,
    ) {
        info!(
            user.id = %user_id,
            ingest.kind = %kind,
            ingest.provider = %provider,
            ingest.received = %received,
            ingest.stored = %stored,
            "Health data batch ingested"
        );
    }
}
