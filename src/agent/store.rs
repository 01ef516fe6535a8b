// ABOUTME: Conversation history storage for coaching chat sessions behind a swappable trait
// ABOUTME: Ships an in-process DashMap implementation; history does not survive a restart
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::constants::agent::MAX_HISTORY_MESSAGES;
use crate::errors::AppResult;
use crate::llm::ChatMessage;

/// Append-only message log keyed by session id
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append messages to a session, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> AppResult<()>;

    /// Messages of a session, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    async fn history(&self, session_id: &str) -> AppResult<Vec<ChatMessage>>;
}

/// Process-local history, capped per session
#[derive(Clone)]
pub struct InMemoryConversationStore {
    /// Session id -> messages, oldest first
    sessions: Arc<DashMap<String, Vec<ChatMessage>>>,
    max_messages: usize,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConversationStore {
    /// Store keeping the newest 40 messages per session
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_MESSAGES)
    }

    /// Store keeping the newest `max_messages` messages per session
    #[must_use]
    pub fn with_capacity(max_messages: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_messages: max_messages.max(1),
        }
    }

    /// Number of sessions with history
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> AppResult<()> {
        let mut entry = self.sessions.entry(session_id.to_owned()).or_default();
        entry.extend(messages);
        let overflow = entry.len().saturating_sub(self.max_messages);
        if overflow > 0 {
            entry.drain(..overflow);
        }
        Ok(())
    }

    async fn history(&self, session_id: &str) -> AppResult<Vec<ChatMessage>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
