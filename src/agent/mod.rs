// ABOUTME: Conversational coaching agent: runtime, conversation history and the callable tools
// ABOUTME: Re-exports the types used by the chat routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod runtime;
pub mod store;
pub mod tools;

pub use runtime::{AgentEvent, AgentRuntime, ChatTurn, PreparedTurn};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use tools::{CoachingTool, ToolCapabilities, ToolContext, ToolRegistry};
