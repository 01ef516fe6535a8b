// ABOUTME: Conversational coaching agent that runs a bounded model/tool loop per chat turn
// ABOUTME: Serializes turns per session, binds tool identity to the caller and streams token/tool events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Agent Runtime
//!
//! One runtime is shared by every chat request. It holds no per-user state
//! beyond the conversation store; the caller's identity travels with each
//! turn in a [`ToolContext`].
//!
//! A turn:
//! 1. resolves (or creates) the caller's session
//! 2. takes the session's lock so turns on one session never interleave
//! 3. replays history with the dated user message and offers every tool
//! 4. executes requested tools and feeds results back, at most ten rounds
//! 5. stores the user message and the final reply

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::store::{ConversationStore, InMemoryConversationStore};
use super::tools::{ToolContext, ToolRegistry};
use crate::constants::agent::{
    MAX_MESSAGE_LEN, MAX_TOOL_ITERATIONS, TEMPERATURE, TOOL_OUTPUT_PREVIEW_LEN,
};
use crate::database::{elapsed_ms, Database};
use crate::errors::{AppError, AppResult};
use crate::llm::prompts::agent_system_prompt;
use crate::llm::{
    ChatMessage, ChatRequest, ChatResponseWithTools, ChatStream, FunctionCall, LlmProvider,
};
use crate::logging::AppLogger;
use crate::models::CoachingSession;

/// Reply when the model provider cannot be reached
pub const PROVIDER_UNAVAILABLE_REPLY: &str =
    "I'm having trouble reaching my coaching brain right now. Please try again in a moment.";

/// Reply when the tool budget runs out before a final answer
pub const TOOL_LIMIT_REPLY: &str =
    "I pulled together your data but couldn't finish my answer. Could you ask me again, maybe a bit more specifically?";

/// One frame of a streamed chat turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A piece of the reply text
    Token {
        /// Text fragment
        content: String,
    },
    /// A tool call is starting
    ToolStart {
        /// Tool name
        tool: String,
    },
    /// A tool call finished
    ToolEnd {
        /// Tool name
        tool: String,
        /// Result preview, at most 200 characters
        output: String,
    },
    /// The turn finished
    Done {
        /// Session the turn belongs to
        session_id: String,
    },
    /// The turn failed
    Error {
        /// What went wrong
        message: String,
    },
}

/// Result of a blocking chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    /// Session the turn belongs to
    pub session_id: String,
    /// Assistant reply
    pub message: String,
    /// When the reply was produced
    pub timestamp: DateTime<Utc>,
}

/// A validated turn bound to its session, lock not yet taken
pub struct PreparedTurn {
    session: CoachingSession,
    message: String,
}

impl PreparedTurn {
    /// Session the turn runs in
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session.id
    }
}

type SessionLocks = DashMap<String, Arc<Mutex<()>>>;

/// Holds a session's turn lock; the map entry goes away with the last holder
struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    session_id: String,
    locks: Arc<SessionLocks>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Entries still cloned by a waiting turn have a count above one
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Process-wide coaching agent
#[derive(Clone)]
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    model: String,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    database: Database,
    session_locks: Arc<SessionLocks>,
}

impl AgentRuntime {
    /// Agent with every coaching tool and in-memory history
    #[must_use]
    pub fn new(database: Database, llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        let tools = ToolRegistry::coaching_tools(&database);
        Self {
            llm,
            model: model.into(),
            tools: Arc::new(tools),
            store: Arc::new(InMemoryConversationStore::new()),
            database,
            session_locks: Arc::new(DashMap::new()),
        }
    }

    /// Replace the conversation store
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    /// Tools offered to the model
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Conversation store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Model name used for every turn
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sessions with a turn running or waiting
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.session_locks.len()
    }

    // ========================================================================
    // Turn preparation
    // ========================================================================

    /// Trimmed message, 1 to 1000 characters
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for an empty or over-long message
    pub fn validate_message(message: &str) -> AppResult<String> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("Message cannot be empty"));
        }
        let length = trimmed.chars().count();
        if length > MAX_MESSAGE_LEN {
            return Err(AppError::invalid_input(format!(
                "Message is too long ({length} characters, maximum {MAX_MESSAGE_LEN})"
            )));
        }
        Ok(trimmed.to_owned())
    }

    /// Validate the message and bind it to a session owned by `user_id`
    ///
    /// No session id starts a new session; a supplied one must belong to the caller.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a bad message, `RESOURCE_NOT_FOUND` for a foreign
    /// or unknown session, or a database error
    pub async fn prepare(
        &self,
        user_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> AppResult<PreparedTurn> {
        let message = Self::validate_message(message)?;
        let sessions = self.database.sessions();
        let session = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => sessions.touch(id, user_id).await?,
            None => sessions.create(user_id).await?,
        };
        Ok(PreparedTurn { session, message })
    }

    async fn lock_session(&self, session_id: &str) -> SessionGuard {
        let lock = self
            .session_locks
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SessionGuard {
            guard: Some(lock.lock_owned().await),
            session_id: session_id.to_owned(),
            locks: Arc::clone(&self.session_locks),
        }
    }

    async fn opening_messages(
        &self,
        session_id: &str,
        user_message: &ChatMessage,
    ) -> AppResult<Vec<ChatMessage>> {
        let mut messages = vec![ChatMessage::system(agent_system_prompt())];
        messages.extend(self.store.history(session_id).await?);
        messages.push(user_message.clone());
        Ok(messages)
    }

    // ========================================================================
    // Loop steps
    // ========================================================================

    async fn model_step(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
    ) -> AppResult<ChatResponseWithTools> {
        let request = ChatRequest::new(messages.to_vec())
            .with_model(&self.model)
            .with_temperature(TEMPERATURE);
        let started = Instant::now();
        let result = self
            .llm
            .complete_with_tools(&request, Some(vec![self.tools.declarations()]))
            .await;
        AppLogger::log_llm_call(
            user_id,
            &self.model,
            result.is_ok(),
            elapsed_ms(started),
            false,
        );
        result
    }

    async fn model_stream(&self, user_id: &str, messages: &[ChatMessage]) -> AppResult<ChatStream> {
        let request = ChatRequest::new(messages.to_vec())
            .with_model(&self.model)
            .with_temperature(TEMPERATURE)
            .with_streaming();
        let started = Instant::now();
        let result = self
            .llm
            .complete_stream_with_tools(&request, Some(vec![self.tools.declarations()]))
            .await;
        AppLogger::log_llm_call(
            user_id,
            &self.model,
            result.is_ok(),
            elapsed_ms(started),
            true,
        );
        result
    }

    /// Run one tool call; failures become `{"error": message}` for the model
    async fn run_tool(&self, call: &FunctionCall, ctx: &ToolContext) -> Value {
        let result = self
            .tools
            .execute(&call.name, call.args.clone(), ctx)
            .await;
        AppLogger::log_agent_tool_call(&ctx.user_id, &ctx.session_id, &call.name, result.is_ok());
        result.unwrap_or_else(|e| {
            warn!(tool = %call.name, error = %e, "Agent tool call failed");
            json!({ "error": e.message })
        })
    }

    async fn persist_turn(&self, session_id: &str, user_message: ChatMessage, reply: &str) {
        if let Err(e) = self
            .store
            .append(session_id, vec![user_message, ChatMessage::assistant(reply)])
            .await
        {
            warn!(session_id = %session_id, error = %e, "Failed to store conversation turn");
        }
    }

    // ========================================================================
    // Blocking turn
    // ========================================================================

    /// Run a full turn and return the reply
    ///
    /// Provider failures produce an apology reply instead of an error.
    ///
    /// # Errors
    ///
    /// Returns the [`Self::prepare`] errors, or a conversation store failure
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        session_id: Option<&str>,
    ) -> AppResult<ChatTurn> {
        let turn = self.prepare(user_id, message, session_id).await?;
        self.run_prepared(user_id, turn).await
    }

    /// Run a prepared turn to completion
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation history cannot be read
    pub async fn run_prepared(&self, user_id: &str, turn: PreparedTurn) -> AppResult<ChatTurn> {
        let session_id = turn.session.id;
        let _guard = self.lock_session(&session_id).await;
        let ctx = ToolContext::new(user_id, session_id.clone());
        let user_message = dated_user_message(&turn.message, Utc::now().date_naive());
        let mut messages = self.opening_messages(&session_id, &user_message).await?;

        let mut reply = None;
        for iteration in 0..MAX_TOOL_ITERATIONS {
            let response = match self.model_step(user_id, &messages).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Agent model call failed");
                    reply = Some(PROVIDER_UNAVAILABLE_REPLY.to_owned());
                    break;
                }
            };

            let Some(calls) = response.function_calls.filter(|c| !c.is_empty()) else {
                reply = Some(response.content.unwrap_or_default());
                break;
            };

            info!("Iteration {}: Executing {} tool calls", iteration, calls.len());
            push_assistant_text(&mut messages, response.content.as_deref());
            for call in &calls {
                let output = self.run_tool(call, &ctx).await;
                messages.push(tool_result_message(&call.name, &output));
            }
        }

        let reply = reply
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| TOOL_LIMIT_REPLY.to_owned());
        self.persist_turn(&session_id, user_message, &reply).await;

        Ok(ChatTurn {
            session_id,
            message: reply,
            timestamp: Utc::now(),
        })
    }

    // ========================================================================
    // Streaming turn
    // ========================================================================

    /// Stream a prepared turn as agent events
    ///
    /// Reply text is forwarded as `token` events while the model produces it.
    /// Ends with `done`, or with `error` when the provider fails. Dropping the
    /// stream abandons the turn without storing it.
    pub fn stream_prepared(
        &self,
        user_id: &str,
        turn: PreparedTurn,
    ) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let runtime = self.clone();
        let user_id = user_id.to_owned();

        stream! {
            let session_id = turn.session.id;
            let _guard = runtime.lock_session(&session_id).await;
            let ctx = ToolContext::new(user_id.clone(), session_id.clone());
            let user_message = dated_user_message(&turn.message, Utc::now().date_naive());
            let mut messages = match runtime.opening_messages(&session_id, &user_message).await {
                Ok(messages) => messages,
                Err(e) => {
                    yield AgentEvent::Error { message: e.message };
                    return;
                }
            };

            let mut reply = None;
            for iteration in 0..MAX_TOOL_ITERATIONS {
                let mut chunks = match runtime.model_stream(&user_id, &messages).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Agent model call failed");
                        yield AgentEvent::Error { message: PROVIDER_UNAVAILABLE_REPLY.to_owned() };
                        return;
                    }
                };

                let mut text = String::new();
                let mut calls = Vec::new();
                while let Some(chunk) = chunks.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(session_id = %session_id, error = %e, "Agent stream failed");
                            yield AgentEvent::Error { message: PROVIDER_UNAVAILABLE_REPLY.to_owned() };
                            return;
                        }
                    };
                    if !chunk.delta.is_empty() {
                        text.push_str(&chunk.delta);
                        yield AgentEvent::Token { content: chunk.delta };
                    }
                    if let Some(requested) = chunk.function_calls {
                        calls.extend(requested);
                    }
                    if chunk.is_final {
                        break;
                    }
                }

                if calls.is_empty() {
                    reply = Some(text);
                    break;
                }

                debug!("Iteration {}: Streaming {} tool calls", iteration, calls.len());
                push_assistant_text(&mut messages, Some(&text));
                for call in &calls {
                    yield AgentEvent::ToolStart { tool: call.name.clone() };
                    let output = runtime.run_tool(call, &ctx).await;
                    yield AgentEvent::ToolEnd {
                        tool: call.name.clone(),
                        output: preview(&output),
                    };
                    messages.push(tool_result_message(&call.name, &output));
                }
            }

            let reply = match reply.filter(|text| !text.trim().is_empty()) {
                Some(reply) => reply,
                None => {
                    yield AgentEvent::Token { content: TOOL_LIMIT_REPLY.to_owned() };
                    TOOL_LIMIT_REPLY.to_owned()
                }
            };
            runtime.persist_turn(&session_id, user_message, &reply).await;
            yield AgentEvent::Done { session_id };
        }
    }
}

// ============================================================================
// Message helpers
// ============================================================================

/// User message carrying today's date for the model
#[must_use]
pub fn dated_user_message(message: &str, today: NaiveDate) -> ChatMessage {
    ChatMessage::user(format!("[Today's date: {today}]\n\n{message}"))
}

/// Tool output fed back to the model as a user message
#[must_use]
pub fn tool_result_message(tool: &str, output: &Value) -> ChatMessage {
    ChatMessage::user(format!("[Tool Result for {tool}]: {output}"))
}

fn push_assistant_text(messages: &mut Vec<ChatMessage>, text: Option<&str>) {
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        messages.push(ChatMessage::assistant(text));
    }
}

/// First 200 characters of a tool result
#[must_use]
pub fn preview(output: &Value) -> String {
    output.to_string().chars().take(TOOL_OUTPUT_PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_validation() {
        assert!(AgentRuntime::validate_message("   ").is_err());
        assert_eq!(
            AgentRuntime::validate_message("  How was my week? ").unwrap(),
            "How was my week?"
        );
        assert!(AgentRuntime::validate_message(&"a".repeat(1000)).is_ok());
        assert!(AgentRuntime::validate_message(&"a".repeat(1001)).is_err());
    }

    #[test]
    fn test_dated_message_prefix() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let message = dated_user_message("Plan my run", day);
        assert_eq!(message.content, "[Today's date: 2025-03-14]\n\nPlan my run");
    }

    #[test]
    fn test_tool_result_format_and_preview() {
        let output = json!({"error": "Injury not found"});
        assert_eq!(
            tool_result_message("update_injury_status", &output).content,
            r#"[Tool Result for update_injury_status]: {"error":"Injury not found"}"#
        );
        let long = json!({"text": "x".repeat(500)});
        assert_eq!(preview(&long).chars().count(), 200);
    }

    #[test]
    fn test_event_wire_format() {
        let event = serde_json::to_value(AgentEvent::ToolEnd {
            tool: "get_user_profile".to_owned(),
            output: "{}".to_owned(),
        })
        .unwrap();
        assert_eq!(event["type"], "tool_end");
        assert_eq!(event["tool"], "get_user_profile");
        let done = serde_json::to_value(AgentEvent::Done {
            session_id: "s1".to_owned(),
        })
        .unwrap();
        assert_eq!(done, json!({"type": "done", "session_id": "s1"}));
    }
}
