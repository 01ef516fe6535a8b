// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory databases, seeded athletes, JWTs and scripted language model doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `strideiq_server`

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use strideiq_server::auth::AuthManager;
use strideiq_server::config::{
    AuthConfig, CorsConfig, DatabaseConfig, DatabaseUrl, Environment, LlmConfig, LogLevel,
    ServerConfig,
};
use strideiq_server::database::Database;
use strideiq_server::errors::AppError;
use strideiq_server::llm::{
    ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall, LlmCapabilities,
    LlmProvider, StreamChunk, Tool,
};
use strideiq_server::models::{
    TrainingPreferences, UserGoal, UserProfile, Vo2MaxEstimate, WorkoutSession,
};
use strideiq_server::server::ServerResources;
use tokio_stream::iter;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

pub const TEST_JWT_SECRET: &str = "strideiq-test-secret";
pub const TEST_MODEL: &str = "gpt-4o-mini";

/// Initialize quiet test logging once per test binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Fresh migrated in-memory database
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::in_memory().await.unwrap()
}

// ============================================================================
// Seed data
// ============================================================================

/// Seed a profile, one weight goal and training preferences; returns the user id
pub async fn create_test_user(database: &Database) -> String {
    let user_id = Uuid::new_v4().to_string();
    let profiles = database.profiles();
    profiles
        .upsert_profile(&UserProfile {
            user_id: user_id.clone(),
            first_name: Some("Maya".to_owned()),
            last_name: Some("Lopez".to_owned()),
            gender: Some("female".to_owned()),
            birth_date: None,
            age: Some(34),
            height_inches: Some(66.0),
        })
        .await
        .unwrap();
    profiles
        .add_goal(&UserGoal {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            goal_type: "weight_loss".to_owned(),
            description: Some("Lose 10 lbs before the half marathon".to_owned()),
            target_value: Some(150.0),
            target_unit: Some("lbs".to_owned()),
            target_date: None,
            is_active: true,
        })
        .await
        .unwrap();
    profiles
        .upsert_training_preferences(&TrainingPreferences {
            user_id: user_id.clone(),
            training_level: "intermediate".to_owned(),
            sessions_per_day: Some(1),
            days_per_week: Some(4),
            preferred_time_window: Some("morning".to_owned()),
        })
        .await
        .unwrap();
    profiles
        .record_weight(&user_id, 160.0, Utc::now() - Duration::days(1))
        .await
        .unwrap();
    user_id
}

/// Workout row for `user_id`
pub fn workout(
    user_id: &str,
    activity_type: &str,
    start_time: DateTime<Utc>,
    minutes: i64,
) -> WorkoutSession {
    WorkoutSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_owned(),
        provider: "apple_health".to_owned(),
        source_record_id: Some(Uuid::new_v4().to_string()),
        activity_type: activity_type.to_owned(),
        start_time,
        end_time: Some(start_time + Duration::minutes(minutes)),
        duration_seconds: minutes * 60,
        calories: Some(minutes as f64 * 9.0),
        distance_miles: Some(minutes as f64 / 10.0),
        avg_heart_rate: Some(142),
        max_heart_rate: Some(165),
    }
}

/// VO2max row for `user_id`
pub fn vo2(user_id: &str, measured_at: DateTime<Utc>, value: f64) -> Vo2MaxEstimate {
    Vo2MaxEstimate {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_owned(),
        provider: "apple_health".to_owned(),
        source_record_id: Some(Uuid::new_v4().to_string()),
        measured_at,
        ml_per_kg_min: value,
        estimation_method: Some("apple_health".to_owned()),
    }
}

/// Noon UTC on `day`
pub fn noon(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(12, 0, 0).unwrap().and_utc()
}

// ============================================================================
// Language model doubles
// ============================================================================

/// One scripted model turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Plain text answer
    Text(String),
    /// Request the given tool calls
    Calls(Vec<(String, Value)>),
    /// Provider error
    Fail,
}

/// Provider replaying a fixed script; records every request it sees
pub struct ScriptedLlmProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    plan_text: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlmProvider {
    /// Provider answering plan requests with `plan_text` and agent turns from `turns`
    pub fn new(plan_text: impl Into<String>, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            plan_text: plan_text.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider answering plan requests with a valid four-field JSON plan
    pub fn with_plan() -> Self {
        Self::new(sample_plan_json(), Vec::new())
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self) -> ScriptedTurn {
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedTurn::Text("All done.".to_owned()))
    }
}

/// A valid structured plan: a 45-minute run
pub fn sample_plan_json() -> String {
    serde_json::json!({
        "todays_training": "**Hey Maya!** 3 workouts, VO₂ 44.0 improving.\n\n**Today:** 45-minute easy run in Zone 2 (130-145 BPM)",
        "nutrition_fueling": "Eat a banana 30 minutes before and 20g protein after.",
        "recovery_protocol": "Sleep 8 hours and foam roll calves for 10 minutes.",
        "reasoning": "Your VO₂ is trending up, so keep building the aerobic base."
    })
    .to_string()
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted Test Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::full_featured()
    }

    fn default_model(&self) -> &str {
        TEST_MODEL
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChatResponse {
            content: self.plan_text.clone(),
            model: TEST_MODEL.to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        let text = self.plan_text.clone();
        let middle = text.len() / 2;
        let split = (middle..text.len())
            .find(|i| text.is_char_boundary(*i))
            .unwrap_or(text.len());
        let mut last = StreamChunk::finished(Some("stop".to_owned()));
        last.delta = text[split..].to_owned();
        let chunks = vec![Ok(StreamChunk::delta(&text[..split])), Ok(last)];
        Ok(Box::pin(iter(chunks)))
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.next_turn() {
            ScriptedTurn::Text(text) => Ok(ChatResponseWithTools {
                content: Some(text),
                function_calls: None,
                model: TEST_MODEL.to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            ScriptedTurn::Calls(calls) => Ok(ChatResponseWithTools {
                content: None,
                function_calls: Some(
                    calls
                        .into_iter()
                        .map(|(name, args)| FunctionCall { name, args })
                        .collect(),
                ),
                model: TEST_MODEL.to_owned(),
                usage: None,
                finish_reason: Some("tool_calls".to_owned()),
            }),
            ScriptedTurn::Fail => Err(AppError::external_service("openai", "scripted failure")),
        }
    }

    async fn complete_stream_with_tools(
        &self,
        request: &ChatRequest,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatStream, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = match self.next_turn() {
            ScriptedTurn::Text(text) => {
                let mut chunks: Vec<Result<StreamChunk, AppError>> = text
                    .split_inclusive(' ')
                    .map(|word| Ok(StreamChunk::delta(word)))
                    .collect();
                chunks.push(Ok(StreamChunk::finished(Some("stop".to_owned()))));
                chunks
            }
            ScriptedTurn::Calls(calls) => {
                let mut last = StreamChunk::finished(Some("tool_calls".to_owned()));
                last.function_calls = Some(
                    calls
                        .into_iter()
                        .map(|(name, args)| FunctionCall { name, args })
                        .collect(),
                );
                vec![Ok(last)]
            }
            ScriptedTurn::Fail => return Err(AppError::external_service("openai", "scripted failure")),
        };
        Ok(Box::pin(iter(chunks)))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// Provider that fails every call
pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn display_name(&self) -> &'static str {
        "Failing Test Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::full_featured()
    }

    fn default_model(&self) -> &str {
        TEST_MODEL
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        Err(AppError::external_service("openai", "service unavailable"))
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        Err(AppError::external_service("openai", "service unavailable"))
    }

    async fn complete_with_tools(
        &self,
        _request: &ChatRequest,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        Err(AppError::external_service("openai", "service unavailable"))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(false)
    }
}

// ============================================================================
// Server resources
// ============================================================================

/// Configuration suitable for tests: in-memory database, fixed secret
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        http_port: 0,
        log_level: LogLevel::Warn,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
            auto_migrate: true,
        },
        llm: LlmConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: None,
            model: TEST_MODEL.to_owned(),
        },
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_owned(),
            jwt_expiry_hours: 1,
        },
        cors: CorsConfig {
            allowed_origins: "*".to_owned(),
        },
    }
}

/// Resources over a fresh database and the given model double
pub async fn create_test_server_resources(llm: Arc<dyn LlmProvider>) -> Arc<ServerResources> {
    let database = create_test_database().await;
    let auth_manager = AuthManager::new(TEST_JWT_SECRET.as_bytes().to_vec(), 1);
    Arc::new(ServerResources::new(database, auth_manager, llm, test_config()))
}

/// Bearer header value for `user_id`
pub fn bearer(resources: &ServerResources, user_id: &str) -> String {
    let token = resources.auth_manager.generate_token(user_id).unwrap();
    format!("Bearer {token}")
}
