// ABOUTME: System-wide constants for the StrideIQ coaching backend
// ABOUTME: Context window sizes, language model parameters, agent limits and environment defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Constants Module
//!
//! Application constants and environment-based configuration defaults.

/// Service identity used in logs and token audiences
pub mod service_names {
    /// Service name reported in structured logs
    pub const STRIDEIQ_SERVER: &str = "strideiq-server";
    /// JWT audience accepted by the API
    pub const API_AUDIENCE: &str = "strideiq";
}

/// Bounded windows used by the context aggregator
pub mod context_windows {
    /// Newest weight, VO2, sleep and workout rows fed into the prompt
    pub const RECENT_ROWS: i64 = 3;
    /// Days of heart-rate and step history
    pub const RECENT_DAYS: i64 = 3;
    /// Maximum heart-rate samples read for daily averages
    pub const HEART_RATE_SAMPLE_LIMIT: i64 = 100;
    /// Trailing window for prior recommendations
    pub const PRIOR_RECOMMENDATION_DAYS: i64 = 7;
    /// Maximum prior recommendations read into the context
    pub const PRIOR_RECOMMENDATION_LIMIT: i64 = 7;
    /// Prior recommendations listed verbatim in the prompt
    pub const PROMPT_PRIOR_PLANS: usize = 5;
}

/// Recommendation store limits
pub mod recommendations {
    /// Hard cap on rows returned by `list_recent`, regardless of window
    pub const LIST_RECENT_CAP: i64 = 10;
    /// Maximum characters accepted in status-update notes
    pub const MAX_STATUS_NOTES_LEN: usize = 500;
    /// Relative duration tolerance used by the compliance matcher
    pub const DURATION_TOLERANCE: f64 = 0.2;
}

/// Progress dashboard windows
pub mod progress {
    /// Days in one reporting week, today included
    pub const WEEK_DAYS: i64 = 7;
    /// Trailing weeks summarized besides the current one
    pub const TRAILING_WEEKS: i64 = 4;
    /// VO2max trend lookback in days
    pub const VO2_TREND_DAYS: i64 = 30;
    /// Completed days inspected when counting the streak
    pub const STREAK_LOOKBACK: i64 = 30;
}

/// Language model parameters for plan generation
pub mod coaching_llm {
    /// Default model for both the plan generator and the agent
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    /// Sampling temperature for plan generation
    pub const PLAN_TEMPERATURE: f32 = 0.7;
    /// Completion token ceiling for plan generation
    pub const PLAN_MAX_TOKENS: u32 = 2000;
    /// Name of the structured-output schema
    pub const PLAN_SCHEMA_NAME: &str = "coaching_recommendation";
    /// Age assumed when the profile does not carry one
    pub const DEFAULT_AGE: u32 = 30;
    /// Name used when the profile has no first name
    pub const DEFAULT_FIRST_NAME: &str = "Athlete";
}

/// Conversational agent limits
pub mod agent {
    /// Maximum tool call iterations before forcing a text response
    pub const MAX_TOOL_ITERATIONS: usize = 10;
    /// Sampling temperature for agent turns
    pub const TEMPERATURE: f32 = 0.3;
    /// Maximum characters in a single user chat message
    pub const MAX_MESSAGE_LEN: usize = 1000;
    /// Tool output characters echoed in `tool_end` stream events
    pub const TOOL_OUTPUT_PREVIEW_LEN: usize = 200;
    /// History messages replayed to the model per turn
    pub const MAX_HISTORY_MESSAGES: usize = 40;
}

/// Environment defaults
pub mod defaults {
    /// Default HTTP port
    pub const HTTP_PORT: u16 = 8081;
    /// Default bind host
    pub const HOST: &str = "127.0.0.1";
    /// Default `SQLite` database location
    pub const DATABASE_URL: &str = "sqlite:./data/strideiq.db";
    /// Default `OpenAI` API base URL
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    /// Default JWT lifetime in hours
    pub const JWT_EXPIRY_HOURS: i64 = 24;
}
