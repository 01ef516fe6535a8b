// ABOUTME: Daily plan generation through a structured-output LLM call with a deterministic fallback
// ABOUTME: Blocking and streaming entry points share one request builder and one response parser
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Recommendation Generator
//!
//! Turns a [`UserContext`] into a four-field [`RecommendationDraft`].
//!
//! The model is asked for strict JSON. Whatever comes back is parsed in three
//! tiers: JSON first, then markdown section headers, and finally the whole
//! text as today's training. Provider failures never reach the caller; they
//! are logged and replaced by [`fallback_draft`], which is computed from the
//! context alone.

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use super::context::UserContext;
use super::prompts::build_coaching_prompt;
use super::trends::{heart_rate_zone, vo2_trend_phrase};
use crate::constants::coaching_llm::{PLAN_MAX_TOKENS, PLAN_SCHEMA_NAME, PLAN_TEMPERATURE};
use crate::llm::prompts::coaching_system_prompt;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::logging::AppLogger;
use crate::models::RecommendationDraft;

/// Where a draft came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    /// Parsed from model output
    Model,
    /// Rule-based plan built after a provider failure
    Fallback,
}

/// A draft plus how it was produced
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    /// The four-field plan
    pub draft: RecommendationDraft,
    /// Model or fallback
    pub source: PlanSource,
    /// Provider error that forced the fallback
    pub error: Option<String>,
}

impl GeneratedPlan {
    fn from_model(draft: RecommendationDraft) -> Self {
        Self {
            draft,
            source: PlanSource::Model,
            error: None,
        }
    }

    fn fallback(draft: RecommendationDraft, error: impl Into<String>) -> Self {
        Self {
            draft,
            source: PlanSource::Fallback,
            error: Some(error.into()),
        }
    }

    /// True when the fallback plan was used
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == PlanSource::Fallback
    }
}

/// Events produced by [`RecommendationGenerator::stream`]
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// Incremental model text, in generation order
    Chunk(String),
    /// Terminal event with the parsed (or fallback) plan
    Complete(GeneratedPlan),
}

/// LLM-backed plan generator
#[derive(Clone)]
pub struct RecommendationGenerator {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl RecommendationGenerator {
    /// Create a generator using `model` on `llm`
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Model identifier sent with every request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request shared by both entry points
    #[must_use]
    pub fn build_request(&self, context: &UserContext, streaming: bool) -> ChatRequest {
        let request = ChatRequest::new(vec![
            ChatMessage::system(coaching_system_prompt()),
            ChatMessage::user(build_coaching_prompt(context)),
        ])
        .with_model(&self.model)
        .with_temperature(PLAN_TEMPERATURE)
        .with_max_tokens(PLAN_MAX_TOKENS)
        .with_json_schema(PLAN_SCHEMA_NAME, plan_schema());

        if streaming {
            request.with_streaming()
        } else {
            request
        }
    }

    /// Generate a plan, falling back to the rule-based draft on any provider failure
    pub async fn generate(&self, context: &UserContext) -> GeneratedPlan {
        let request = self.build_request(context, false);
        let start = Instant::now();

        let outcome = match self.llm.complete(&request).await {
            Ok(response) => {
                let draft = parse_response(&response.content);
                if draft.is_empty() {
                    Err("Model returned an empty plan".to_owned())
                } else {
                    Ok(draft)
                }
            }
            Err(e) => Err(e.to_string()),
        };

        let plan = match outcome {
            Ok(draft) => GeneratedPlan::from_model(draft),
            Err(error) => {
                warn!(user_id = %context.user_id, error = %error, "Plan generation failed, using fallback");
                GeneratedPlan::fallback(fallback_draft(context), error)
            }
        };

        AppLogger::log_llm_call(
            &context.user_id,
            &self.model,
            !plan.is_fallback(),
            millis_since(start),
            plan.is_fallback(),
        );
        plan
    }

    /// Stream model text as it is produced, ending with exactly one `Complete`
    ///
    /// Dropping the returned stream stops consuming provider output.
    pub fn stream(&self, context: &UserContext) -> impl Stream<Item = GenerationEvent> + Send {
        let llm = Arc::clone(&self.llm);
        let model = self.model.clone();
        let user_id = context.user_id.clone();
        let request = self.build_request(context, true);
        let fallback = fallback_draft(context);

        stream! {
            let start = Instant::now();
            let mut full_text = String::new();
            let mut failure: Option<String> = None;

            match llm.complete_stream(&request).await {
                Ok(mut chunks) => {
                    while let Some(item) = chunks.next().await {
                        match item {
                            Ok(chunk) => {
                                if !chunk.delta.is_empty() {
                                    full_text.push_str(&chunk.delta);
                                    yield GenerationEvent::Chunk(chunk.delta);
                                }
                                if chunk.is_final {
                                    break;
                                }
                            }
                            Err(e) => {
                                failure = Some(e.to_string());
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e.to_string()),
            }

            let plan = match failure {
                Some(error) => GeneratedPlan::fallback(fallback, error),
                None => {
                    let draft = parse_response(&full_text);
                    if draft.is_empty() {
                        GeneratedPlan::fallback(fallback, "Model returned an empty plan")
                    } else {
                        GeneratedPlan::from_model(draft)
                    }
                }
            };

            if let Some(error) = &plan.error {
                warn!(user_id = %user_id, error = %error, "Streaming plan generation failed, using fallback");
            }
            AppLogger::log_llm_call(&user_id, &model, !plan.is_fallback(), millis_since(start), plan.is_fallback());
            yield GenerationEvent::Complete(plan);
        }
    }
}

fn millis_since(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Strict JSON schema for the four plan fields
#[must_use]
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "todays_training": {
                "type": "string",
                "description": "Greeting with name, workout count and VO2 trend, then today's workout with zone and BPM range"
            },
            "nutrition_fueling": {
                "type": "string",
                "description": "Pre-workout, post-workout and daily nutrition bullets"
            },
            "recovery_protocol": {
                "type": "string",
                "description": "Sleep and stretching bullets"
            },
            "reasoning": {
                "type": "string",
                "description": "One or two sentences tying the plan to the athlete's trends"
            }
        },
        "required": ["todays_training", "nutrition_fueling", "recovery_protocol", "reasoning"],
        "additionalProperties": false
    })
}

// ============================================================================
// Response parsing
// ============================================================================

/// Parse model output: JSON, then markdown sections, then raw text
#[must_use]
pub fn parse_response(text: &str) -> RecommendationDraft {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return RecommendationDraft::default();
    }

    if let Some(draft) = parse_json(trimmed) {
        return draft;
    }

    let draft = parse_markdown_sections(trimmed);
    if !draft.is_empty() {
        return draft;
    }

    debug!("Plan output had no recognizable structure, using raw text");
    RecommendationDraft {
        todays_training: trimmed.to_owned(),
        ..RecommendationDraft::default()
    }
}

fn parse_json(text: &str) -> Option<RecommendationDraft> {
    let body = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map_or(text, str::trim);

    serde_json::from_str::<RecommendationDraft>(body)
        .ok()
        .filter(|draft| !draft.is_empty())
}

#[derive(Clone, Copy)]
enum Section {
    Training,
    Nutrition,
    Recovery,
    Reasoning,
}

fn section_for_header(line: &str) -> Option<Section> {
    let header = line.trim_start_matches('#').trim();
    if header.starts_with("Today's Training") || header.starts_with("Today’s Training") {
        Some(Section::Training)
    } else if header.starts_with("Nutrition & Fueling") || header.starts_with("Nutrition and Fueling")
    {
        Some(Section::Nutrition)
    } else if header.starts_with("Recovery Protocol") {
        Some(Section::Recovery)
    } else if header.starts_with("The Reasoning") {
        Some(Section::Reasoning)
    } else {
        None
    }
}

fn parse_markdown_sections(text: &str) -> RecommendationDraft {
    let mut draft = RecommendationDraft::default();
    let mut current: Option<Section> = None;

    for line in text.lines().map(str::trim) {
        if line.starts_with("##") {
            current = section_for_header(line);
            continue;
        }
        if line.is_empty() {
            continue;
        }
        let Some(section) = current else {
            continue;
        };
        let target = match section {
            Section::Training => &mut draft.todays_training,
            Section::Nutrition => &mut draft.nutrition_fueling,
            Section::Recovery => &mut draft.recovery_protocol,
            Section::Reasoning => &mut draft.reasoning,
        };
        if !target.is_empty() {
            target.push('\n');
        }
        target.push_str(line);
    }

    draft
}

// ============================================================================
// Fallback
// ============================================================================

const FALLBACK_NUTRITION: &str = "- **Pre-workout:** Water 30min before\n- **Post-workout:** Protein shake within 30min\n- **Daily:** 0.6g protein/lb bodyweight";
const FALLBACK_RECOVERY: &str = "- **Sleep:** 7-8 hours\n- **Stretching:** 10min post-workout";
const FALLBACK_REASONING: &str = "Building aerobic base, the foundation for endurance training.";

/// Rule-based plan computed from local context only
///
/// Infallible and free of I/O.
#[must_use]
pub fn fallback_draft(context: &UserContext) -> RecommendationDraft {
    let stats = &context.today_stats;
    let vo2_text = stats
        .vo2_max
        .map_or_else(|| "N/A".to_owned(), |v| format!("{v:.1}"));
    let trend_text = if stats.vo2_max.is_some() {
        vo2_trend_phrase(context.trends.vo2_max.as_ref())
    } else {
        vo2_trend_phrase(None)
    };
    let zone = heart_rate_zone(context.age(), 1);

    let todays_training = format!(
        "**Hey {}!** {} workouts, VO₂ {vo2_text} {trend_text}.\n\n**Today:** 30-min easy walk, Zone 1 ({}-{} BPM)",
        context.first_name(),
        stats.workout_count,
        zone.low_bpm,
        zone.high_bpm,
    );

    let reasoning = if let Some(vo2) = &context.trends.vo2_max {
        format!("VO₂ {}. Active recovery consolidates gains.", vo2.direction)
    } else if let Some(hr) = &context.trends.heart_rate {
        format!(
            "Resting HR {}. Building base while managing recovery.",
            hr.direction
        )
    } else {
        FALLBACK_REASONING.to_owned()
    };

    RecommendationDraft {
        todays_training,
        nutrition_fueling: FALLBACK_NUTRITION.to_owned(),
        recovery_protocol: FALLBACK_RECOVERY.to_owned(),
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching::extraction::extract_workout_details;
    use crate::models::WorkoutType;

    #[test]
    fn test_parses_json_output() {
        let text = r#"{"todays_training":"**Hey Sam!** 2 workouts","nutrition_fueling":"- Banana","recovery_protocol":"- Sleep 8h","reasoning":"Base."}"#;
        let draft = parse_response(text);
        assert_eq!(draft.todays_training, "**Hey Sam!** 2 workouts");
        assert_eq!(draft.reasoning, "Base.");
    }

    #[test]
    fn test_parses_fenced_json() {
        let text = "```json\n{\"todays_training\":\"run\",\"nutrition_fueling\":\"\",\"recovery_protocol\":\"\",\"reasoning\":\"\"}\n```";
        assert_eq!(parse_response(text).todays_training, "run");
    }

    #[test]
    fn test_parses_markdown_sections() {
        let text = "## Today's Training\n30-min run\nZone 2\n\n## Nutrition & Fueling\n- Oats\n## Recovery Protocol\n- Sleep\n## The Reasoning\nBuild base.\n## Extra\nignored";
        let draft = parse_response(text);
        assert_eq!(draft.todays_training, "30-min run\nZone 2");
        assert_eq!(draft.nutrition_fueling, "- Oats");
        assert_eq!(draft.recovery_protocol, "- Sleep");
        assert_eq!(draft.reasoning, "Build base.");
    }

    #[test]
    fn test_unstructured_text_becomes_training() {
        let draft = parse_response("Go for an easy jog today.");
        assert_eq!(draft.todays_training, "Go for an easy jog today.");
        assert!(draft.nutrition_fueling.is_empty());
        assert!(parse_response("   ").is_empty());
    }

    #[test]
    fn test_fallback_for_new_user() {
        let draft = fallback_draft(&UserContext::empty("u1"));
        assert_eq!(
            draft.todays_training,
            "**Hey Athlete!** 0 workouts, VO₂ N/A stable.\n\n**Today:** 30-min easy walk, Zone 1 (95-114 BPM)"
        );
        assert_eq!(draft.reasoning, FALLBACK_REASONING);
        assert!(!draft.nutrition_fueling.is_empty());
        assert!(!draft.recovery_protocol.is_empty());

        // the fallback must be extractable like any other plan
        let details = extract_workout_details(&draft.todays_training);
        assert_eq!(details.workout_type, Some(WorkoutType::Walk));
        assert_eq!(details.duration_minutes, Some(30));
        assert_eq!(details.intensity_zone.as_deref(), Some("zone_1"));
        assert_eq!(details.heart_rate_range.as_deref(), Some("95-114"));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = plan_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 4);
        assert_eq!(schema["additionalProperties"], false);
    }
}
