// ABOUTME: Main library entry point for the StrideIQ coaching backend
// ABOUTME: Wearable data ingestion, daily AI training plans and a tool-using coaching agent over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # StrideIQ Server
//!
//! A coaching backend for runners and walkers. Wearable samples arrive in
//! provider batches, a daily plan is generated from the athlete's context by a
//! language model (with a rule-based fallback), yesterday's plan is checked
//! against the workouts actually logged, and a conversational agent can read
//! and change the athlete's data through a fixed set of tools.
//!
//! ## Architecture
//!
//! - **Database**: `SQLite` managers per area (profiles, samples, plans, injuries, sessions)
//! - **Coaching**: context aggregation, trends, prompt building, generation and compliance
//! - **Agent**: tool registry, conversation store and the tool-calling turn loop
//! - **Ingestion**: validated, de-duplicated batch writes
//! - **Routes**: axum routers sharing one [`server::ServerResources`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use strideiq_server::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("StrideIQ configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Conversational coaching agent and its tools
pub mod agent;

/// Bearer token authentication
pub mod auth;

/// Recommendation pipeline: context, trends, prompts, generation, compliance
pub mod coaching;

/// Environment-based configuration
pub mod config;

/// Application constants and defaults
pub mod constants;

/// `SQLite` persistence
pub mod database;

/// Unified error handling
pub mod errors;

/// Wearable data ingestion
pub mod ingestion;

/// Language model providers
pub mod llm;

/// Structured logging
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Domain models
pub mod models;

/// HTTP routes
pub mod routes;

/// Server resources and serve loop
pub mod server;
