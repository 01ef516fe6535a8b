// ABOUTME: Coaching recommendation engine: context aggregation, generation, persistence and compliance
// ABOUTME: Pure helpers (trends, prompts, extraction, matching) sit beside the orchestrating service
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Coaching Engine
//!
//! - [`context`]: per-request snapshot of a user's fitness state
//! - [`trends`]: derived trends, compliance rate and heart-rate zones
//! - [`prompts`]: user prompt construction
//! - [`generator`]: structured-output LLM call, parsing and fallback
//! - [`extraction`]: structured workout fields from plan text
//! - [`compliance`]: plan-versus-workout matching
//! - [`progress`]: weekly compliance and personal-record dashboard
//! - [`service`]: the end-to-end recommendation flow

pub mod compliance;
pub mod context;
pub mod extraction;
pub mod generator;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod trends;

pub use compliance::{ComplianceCheck, ComplianceChecker, ComplianceOutcome};
pub use context::{ContextAggregator, TodayStats, UserContext};
pub use generator::{GeneratedPlan, GenerationEvent, PlanSource, RecommendationGenerator};
pub use progress::{ProgressReport, ProgressService, WeeklyStats};
pub use service::{CoachingService, QuickAction, RecommendationItem, RecommendationStreamEvent};
pub use trends::{Trend, TrendDirection, Trends};
