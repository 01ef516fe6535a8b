// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Exposes environment-driven server, database, LLM and auth configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the StrideIQ server
//!
//! - **Environment**: Server configuration loaded from environment variables

/// Environment and server configuration
pub mod environment;

pub use environment::{
    AuthConfig, CorsConfig, DatabaseConfig, DatabaseUrl, Environment, LlmConfig, LogLevel,
    ServerConfig,
};
