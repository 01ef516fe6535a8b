// ABOUTME: Tests for loading server configuration from environment variables
// ABOUTME: Runs serially because every case mutates process-wide environment state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;
use std::path::PathBuf;

use serial_test::serial;
use strideiq_server::config::{DatabaseUrl, Environment, LogLevel, ServerConfig};

const VARS: &[&str] = &[
    "HOST",
    "HTTP_PORT",
    "LOG_LEVEL",
    "ENVIRONMENT",
    "DATABASE_URL",
    "AUTO_MIGRATE",
    "OPENAI_BASE_URL",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "JWT_SECRET",
    "JWT_EXPIRY_HOURS",
    "CORS_ALLOWED_ORIGINS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.http_port, 8081);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(
        config.database.url,
        DatabaseUrl::SQLite {
            path: PathBuf::from("./data/strideiq.db")
        }
    );
    assert!(config.database.auto_migrate);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.cors.allowed_origins, "*");
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    env::set_var("HTTP_PORT", "9090");
    env::set_var("LOG_LEVEL", "debug");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("OPENAI_MODEL", "gpt-4o");
    env::set_var("JWT_SECRET", "top-secret");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://app.example.com");

    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.database.url, DatabaseUrl::Memory);
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm.model, "gpt-4o");
    assert_eq!(config.cors.allowed_origins, "https://app.example.com");

    let summary = config.summary();
    assert!(summary.contains("gpt-4o"));
    assert!(!summary.contains("top-secret"));
    assert!(!summary.contains("sk-test"));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_env();
    env::set_var("HTTP_PORT", "not-a-port");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("DATABASE_URL", "postgres://localhost/strideiq");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("JWT_EXPIRY_HOURS", "0");
    assert!(ServerConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_production_requires_jwt_secret() {
    clear_env();
    env::set_var("ENVIRONMENT", "production");
    assert!(ServerConfig::from_env().is_err());

    env::set_var("JWT_SECRET", "prod-secret");
    let config = ServerConfig::from_env().unwrap();
    clear_env();
    assert!(config.environment.is_production());
}
