// ABOUTME: Tool abstraction for the coaching agent with capability flags and a name-keyed registry
// ABOUTME: Tools receive the caller's identity through an explicit ToolContext, never from message text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Coaching Agent Tools
//!
//! Each tool is a narrow operation over the athlete's stored data. The model
//! picks tools by name; the runtime resolves them here and hands every call a
//! [`ToolContext`] bound to the authenticated user and chat session.
//!
//! - [`health`]: live health data, profile, VO2 trends and workout history
//! - [`plans`]: previous plans and plan creation or edits
//! - [`injuries`]: injury reporting, check-ins, active list and history

pub mod health;
pub mod injuries;
pub mod plans;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;
use serde_json::Value;
use tracing::{debug, warn};

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::{FunctionDeclaration, Tool};

pub use health::{
    analyze_vo2_trend, GetUserHealthDataTool, GetUserProfileTool, GetVo2TrendsTool,
    GetWorkoutDetailsTool,
};
pub use injuries::{
    injury_patterns, GetActiveInjuriesTool, GetInjuryHistoryTool, ReportInjuryTool,
    UpdateInjuryStatusTool,
};
pub use plans::{CreateCoachingPlanTool, GetPreviousPlansTool, UpdateCoachingPlanTool};

bitflags! {
    /// What a tool touches, used for logging and filtering
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ToolCapabilities: u8 {
        /// Reads stored athlete data
        const READS_DATA = 0b0000_0001;
        /// Creates or modifies stored data
        const WRITES_DATA = 0b0000_0010;
        /// Works on coaching plans
        const PLANS = 0b0000_0100;
        /// Works on injuries
        const INJURIES = 0b0000_1000;
        /// Computes derived statistics
        const ANALYTICS = 0b0001_0000;
    }
}

impl ToolCapabilities {
    /// Whether the tool modifies stored data
    #[must_use]
    pub const fn writes_data(self) -> bool {
        self.contains(Self::WRITES_DATA)
    }

    /// Comma-separated flag names for logging
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(Self::READS_DATA) {
            parts.push("reads_data");
        }
        if self.contains(Self::WRITES_DATA) {
            parts.push("writes_data");
        }
        if self.contains(Self::PLANS) {
            parts.push("plans");
        }
        if self.contains(Self::INJURIES) {
            parts.push("injuries");
        }
        if self.contains(Self::ANALYTICS) {
            parts.push("analytics");
        }
        if parts.is_empty() {
            "none".to_owned()
        } else {
            parts.join(", ")
        }
    }
}

/// Identity a tool call runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    /// Authenticated user, taken from the session binding
    pub user_id: String,
    /// Chat session the call belongs to
    pub session_id: String,
}

impl ToolContext {
    /// Bind a tool call to a user and session
    #[must_use]
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// A callable operation exposed to the coaching model
#[async_trait]
pub trait CoachingTool: Send + Sync {
    /// Unique name the model calls the tool by
    fn name(&self) -> &'static str;

    /// What the tool does, shown to the model
    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object
    fn parameters(&self) -> Value;

    /// Capability flags
    fn capabilities(&self) -> ToolCapabilities;

    /// Run the tool for the caller in `ctx`
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments, missing resources or storage failures
    async fn execute(&self, args: Value, ctx: &ToolContext) -> AppResult<Value>;
}

// ============================================================================
// Registry
// ============================================================================

/// Name-keyed set of tools available to the agent
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn CoachingTool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every coaching tool over `database`
    #[must_use]
    pub fn coaching_tools(database: &Database) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetUserHealthDataTool::new(database.clone())));
        registry.register(Arc::new(GetUserProfileTool::new(database.clone())));
        registry.register(Arc::new(GetPreviousPlansTool::new(database.clone())));
        registry.register(Arc::new(GetVo2TrendsTool::new(database.clone())));
        registry.register(Arc::new(GetWorkoutDetailsTool::new(database.clone())));
        registry.register(Arc::new(CreateCoachingPlanTool::new(database.clone())));
        registry.register(Arc::new(UpdateCoachingPlanTool::new(database.clone())));
        registry.register(Arc::new(ReportInjuryTool::new(database.clone())));
        registry.register(Arc::new(UpdateInjuryStatusTool::new(database.clone())));
        registry.register(Arc::new(GetActiveInjuriesTool::new(database.clone())));
        registry.register(Arc::new(GetInjuryHistoryTool::new(database.clone())));
        registry
    }

    /// Register a tool
    ///
    /// # Returns
    ///
    /// `true` if the tool was registered, `false` if the name was taken
    pub fn register(&mut self, tool: Arc<dyn CoachingTool>) -> bool {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) {
            warn!("Tool '{}' is already registered, skipping", name);
            return false;
        }

        debug!(
            "Registering tool '{}' with capabilities: {}",
            name,
            tool.capabilities().describe()
        );
        self.tools.insert(name, tool);
        true
    }

    /// Look up a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CoachingTool>> {
        self.tools.get(name)
    }

    /// Whether a tool with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Function declarations for the model, sorted by name
    #[must_use]
    pub fn declarations(&self) -> Tool {
        let mut function_declarations: Vec<FunctionDeclaration> = self
            .tools
            .values()
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: Some(tool.parameters()),
            })
            .collect();
        function_declarations.sort_by(|a, b| a.name.cmp(&b.name));
        Tool {
            function_declarations,
        }
    }

    /// Execute a tool by name
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for an unknown tool, or the tool's own error
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> AppResult<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("Tool '{name}'")))?;
        tool.execute(args, ctx).await
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Integer argument clamped into `min..=max`, `default` when absent
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the value is present but not an integer
pub fn ranged_int_arg(args: &Value, key: &str, default: i64, min: i64, max: i64) -> AppResult<i64> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .map(|v| v.clamp(min, max))
            .ok_or_else(|| AppError::invalid_input(format!("{key} must be an integer"))),
    }
}

/// Boolean argument, `default` when absent
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the value is present but not a boolean
pub fn bool_arg(args: &Value, key: &str, default: bool) -> AppResult<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| AppError::invalid_input(format!("{key} must be a boolean"))),
    }
}

/// Optional non-blank string argument
#[must_use]
pub fn optional_str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Required non-blank string argument
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the value is missing or blank
pub fn required_str_arg(args: &Value, key: &str) -> AppResult<String> {
    optional_str_arg(args, key).ok_or_else(|| AppError::invalid_input(format!("{key} is required")))
}

/// Optional string argument parsed into `T`
///
/// # Errors
///
/// Returns the parse error when the value is present but invalid
pub fn parsed_arg<T>(args: &Value, key: &str) -> AppResult<Option<T>>
where
    T: FromStr<Err = AppError>,
{
    optional_str_arg(args, key)
        .map(|raw| raw.parse::<T>())
        .transpose()
}

/// Optional positive integer argument that must fit in `u32`
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the value is not a positive integer
pub fn positive_u32_arg(args: &Value, key: &str) -> AppResult<Option<u32>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .map(Some)
            .ok_or_else(|| AppError::invalid_input(format!("{key} must be a positive integer"))),
    }
}

/// Round to `places` decimal places
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
