// ABOUTME: Coaching recommendation orchestration from compliance check through generation and persistence
// ABOUTME: Shapes API responses and shares one post-generation persistence hook between blocking and streaming paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Coaching Service
//!
//! The flow for one request is: check yesterday's pending plan, gather
//! context, generate (or fall back), persist through [`CoachingService::persist_plan`]
//! and shape the response. The streaming path runs the same steps and
//! persists before emitting its `complete` event, so a stream the client
//! abandons early stores nothing.

use std::pin::pin;
use std::sync::Arc;

use async_stream::stream;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use super::compliance::{ComplianceCheck, ComplianceChecker};
use super::context::{ContextAggregator, UserContext};
use super::generator::{GeneratedPlan, GenerationEvent, PlanSource, RecommendationGenerator};
use crate::constants::recommendations::MAX_STATUS_NOTES_LEN;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::LlmProvider;
use crate::models::{
    CoachingRecommendation, RecommendationDraft, RecommendationStatus, RecommendationUpdate,
};

/// Quick actions returned at most
const MAX_QUICK_ACTIONS: usize = 4;
/// Goals turned into quick actions
const MAX_GOAL_ACTIONS: usize = 2;

/// One card of the fixed four-card recommendation list
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecommendationItem {
    /// Card title
    pub title: &'static str,
    /// Markdown body
    pub description: String,
    /// training, nutrition, recovery or insight
    pub category: &'static str,
    /// high, medium or low
    pub priority: &'static str,
}

/// Always four cards in a fixed order, even when a field is empty
#[must_use]
pub fn recommendation_items(draft: &RecommendationDraft) -> Vec<RecommendationItem> {
    vec![
        RecommendationItem {
            title: "Today's Workout",
            description: draft.todays_training.clone(),
            category: "training",
            priority: "high",
        },
        RecommendationItem {
            title: "Nutrition & Fueling",
            description: draft.nutrition_fueling.clone(),
            category: "nutrition",
            priority: "high",
        },
        RecommendationItem {
            title: "Recovery Protocol",
            description: draft.recovery_protocol.clone(),
            category: "recovery",
            priority: "medium",
        },
        RecommendationItem {
            title: "Coach's Analysis",
            description: draft.reasoning.clone(),
            category: "insight",
            priority: "low",
        },
    ]
}

/// Suggested next step for the athlete
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuickAction {
    /// Action family
    #[serde(rename = "type")]
    pub action_type: &'static str,
    /// high or medium
    pub priority: &'static str,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Client action identifier
    pub action: &'static str,
}

/// Up to four actions derived from gaps and goals in the context
#[must_use]
pub fn quick_actions(context: &UserContext) -> Vec<QuickAction> {
    let mut actions = Vec::new();

    if context.latest_weight().is_none() {
        actions.push(QuickAction {
            action_type: "data_input",
            priority: "high",
            title: "Log Your Weight".to_owned(),
            description: "Track your weight to get personalized recommendations".to_owned(),
            action: "log_weight",
        });
    }

    for goal in context.goals.iter().take(MAX_GOAL_ACTIONS) {
        let target = goal
            .target_value
            .map_or_else(|| "None".to_owned(), |v| v.to_string());
        actions.push(QuickAction {
            action_type: "goal_progress",
            priority: "medium",
            title: format!("Track Progress: {}", goal.goal_type),
            description: format!("Target: {target} {}", goal.target_unit.as_deref().unwrap_or(""))
                .trim_end()
                .to_owned(),
            action: "view_goal_progress",
        });
    }

    if let Some(prefs) = &context.training_preferences {
        actions.push(QuickAction {
            action_type: "training",
            priority: "high",
            title: "Today's Workout".to_owned(),
            description: format!("Schedule your {} level training", prefs.training_level),
            action: "view_workout_plan",
        });
    }

    actions.truncate(MAX_QUICK_ACTIONS);
    actions
}

/// Frames of the streaming recommendation endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationStreamEvent {
    /// Progress message
    Status {
        /// Human-readable progress
        message: String,
    },
    /// Data the plan is built from
    Context {
        /// Context summary
        data: Value,
    },
    /// Incremental model text
    Chunk {
        /// Text delta
        content: String,
    },
    /// Parsed and persisted plan
    Complete {
        /// success or `partial_success`
        status: &'static str,
        /// Stored plan id
        recommendation_id: String,
        /// Four-card list
        recommendations: Vec<RecommendationItem>,
        /// The four fields
        insights: RecommendationDraft,
    },
    /// Terminal failure
    Error {
        /// Failure description
        message: String,
    },
    /// End of stream
    Done,
}

const fn response_status(plan: &GeneratedPlan) -> &'static str {
    match plan.source {
        PlanSource::Model => "success",
        PlanSource::Fallback => "partial_success",
    }
}

/// Orchestrates the recommendation lifecycle
#[derive(Clone)]
pub struct CoachingService {
    database: Database,
    aggregator: ContextAggregator,
    generator: RecommendationGenerator,
    compliance: ComplianceChecker,
}

impl CoachingService {
    /// Create the service over a database and a plan-generating model
    pub fn new(database: Database, llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            aggregator: ContextAggregator::new(database.clone()),
            generator: RecommendationGenerator::new(llm, model),
            compliance: ComplianceChecker::new(database.clone()),
            database,
        }
    }

    /// Context aggregator used by this service
    #[must_use]
    pub const fn aggregator(&self) -> &ContextAggregator {
        &self.aggregator
    }

    /// Plan generator used by this service
    #[must_use]
    pub const fn generator(&self) -> &RecommendationGenerator {
        &self.generator
    }

    /// Compliance checker used by this service
    #[must_use]
    pub const fn compliance(&self) -> &ComplianceChecker {
        &self.compliance
    }

    /// Compliance check that never blocks generation
    async fn check_compliance_quietly(&self, user_id: &str) -> Option<ComplianceCheck> {
        match self.compliance.check_yesterday(user_id).await {
            Ok(check) => Some(check),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Compliance check failed before generation");
                None
            }
        }
    }

    /// Post-generation hook shared by the blocking and streaming paths
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be stored
    pub async fn persist_plan(
        &self,
        user_id: &str,
        plan: &GeneratedPlan,
    ) -> AppResult<CoachingRecommendation> {
        let saved = self
            .database
            .recommendations()
            .create(user_id, &plan.draft)
            .await?;
        info!(
            user_id = %user_id,
            recommendation_id = %saved.id,
            workout_type = ?saved.workout_type,
            duration_minutes = ?saved.duration_minutes,
            fallback = plan.is_fallback(),
            "Saved coaching recommendation"
        );
        Ok(saved)
    }

    /// Run the full pipeline and return the response body
    ///
    /// # Errors
    ///
    /// Returns an error only when the plan cannot be persisted
    pub async fn generate_recommendations(&self, user_id: &str) -> AppResult<Value> {
        let compliance_check = self.check_compliance_quietly(user_id).await;
        let context = self.aggregator.gather(user_id).await;
        let plan = self.generator.generate(&context).await;
        let saved = self.persist_plan(user_id, &plan).await?;

        Ok(json!({
            "status": response_status(&plan),
            "user_id": user_id,
            "recommendation_id": saved.id,
            "context_summary": context.summary(),
            "recommendations": recommendation_items(&plan.draft),
            "ai_insights": plan.draft,
            "quick_actions": quick_actions(&context),
            "compliance_check": compliance_check,
            "generated_at": Utc::now().to_rfc3339(),
        }))
    }

    /// Streaming variant: status, context, chunks, complete, done
    pub fn stream_recommendations(
        &self,
        user_id: &str,
    ) -> impl Stream<Item = RecommendationStreamEvent> + Send + 'static {
        let service = self.clone();
        let user_id = user_id.to_owned();

        stream! {
            yield RecommendationStreamEvent::Status {
                message: "Gathering your health data...".to_owned(),
            };

            let _ = service.check_compliance_quietly(&user_id).await;
            let context = service.aggregator.gather(&user_id).await;
            yield RecommendationStreamEvent::Context { data: context.summary() };
            yield RecommendationStreamEvent::Status {
                message: "Generating AI insights...".to_owned(),
            };

            let mut generation = pin!(service.generator.stream(&context));
            let mut final_plan: Option<GeneratedPlan> = None;
            while let Some(event) = generation.next().await {
                match event {
                    GenerationEvent::Chunk(content) => {
                        yield RecommendationStreamEvent::Chunk { content };
                    }
                    GenerationEvent::Complete(plan) => final_plan = Some(plan),
                }
            }

            let Some(plan) = final_plan else {
                yield RecommendationStreamEvent::Error {
                    message: "Generation ended without a plan".to_owned(),
                };
                return;
            };

            match service.persist_plan(&user_id, &plan).await {
                Ok(saved) => {
                    yield RecommendationStreamEvent::Complete {
                        status: response_status(&plan),
                        recommendation_id: saved.id,
                        recommendations: recommendation_items(&plan.draft),
                        insights: plan.draft,
                    };
                    yield RecommendationStreamEvent::Done;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Failed to persist streamed recommendation");
                    yield RecommendationStreamEvent::Error { message: e.message.clone() };
                }
            }
        }
    }

    /// Quick actions without generating a plan
    pub async fn quick_actions(&self, user_id: &str) -> Vec<QuickAction> {
        quick_actions(&self.aggregator.gather(user_id).await)
    }

    /// Summary of the data available for coaching
    pub async fn data_summary(&self, user_id: &str) -> Value {
        let context = self.aggregator.gather(user_id).await;
        let mut summary = context.summary();
        if let Some(object) = summary.as_object_mut() {
            object.insert("today_stats".to_owned(), json!(context.today_stats));
            object.insert("trends".to_owned(), json!(context.trends));
            object.insert("compliance".to_owned(), json!(context.compliance()));
            object.insert(
                "active_injuries".to_owned(),
                json!(context.active_injuries.len()),
            );
        }
        summary
    }

    /// Newest plan for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn latest(&self, user_id: &str) -> AppResult<Option<CoachingRecommendation>> {
        self.database.recommendations().latest(user_id).await
    }

    /// Manual status change from the athlete
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a status outside completed, skipped and partial or
    /// for over-long notes, and `RESOURCE_NOT_FOUND` when the plan is not the caller's
    pub async fn update_status(
        &self,
        user_id: &str,
        recommendation_id: &str,
        status: &str,
        notes: Option<String>,
    ) -> AppResult<CoachingRecommendation> {
        let status = status.parse::<RecommendationStatus>()?;
        if !status.is_terminal() {
            return Err(AppError::invalid_input(
                "Status must be one of: completed, skipped, partial",
            ));
        }
        if notes
            .as_deref()
            .is_some_and(|n| n.chars().count() > MAX_STATUS_NOTES_LEN)
        {
            return Err(AppError::invalid_input(format!(
                "Notes must be at most {MAX_STATUS_NOTES_LEN} characters"
            )));
        }

        self.database
            .recommendations()
            .update(
                recommendation_id,
                user_id,
                &RecommendationUpdate::status(status, notes),
            )
            .await
    }
}
