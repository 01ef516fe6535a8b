// ABOUTME: System prompts for the coaching plan generator and the coaching agent
// ABOUTME: Prompts are markdown files embedded at compile time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy maintenance.

/// Instruction for the one-shot daily plan generator
///
/// Demands the four-field JSON shape, a 25-50 word ceiling, a first sentence
/// carrying name, workout count and VO2 trend, and age-derived HR zones.
pub const COACHING_SYSTEM_PROMPT: &str = include_str!("coaching_system.md");

/// Instruction for the tool-using conversational coach
///
/// Sets the mobile formatting rules and the tool ordering: injuries, recent
/// plans, workouts, VO2 trend, profile, then live health data. Plans are only
/// created after the athlete confirms them.
pub const AGENT_SYSTEM_PROMPT: &str = include_str!("agent_system.md");

/// Get the plan generator system prompt
#[must_use]
pub const fn coaching_system_prompt() -> &'static str {
    COACHING_SYSTEM_PROMPT
}

/// Get the coaching agent system prompt
#[must_use]
pub const fn agent_system_prompt() -> &'static str {
    AGENT_SYSTEM_PROMPT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_prompt_names_all_fields() {
        for field in [
            "todays_training",
            "nutrition_fueling",
            "recovery_protocol",
            "reasoning",
        ] {
            assert!(coaching_system_prompt().contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_agent_prompt_requires_confirmation_before_create() {
        let prompt = agent_system_prompt();
        assert!(prompt.contains("create_coaching_plan"));
        assert!(prompt.contains("get_active_injuries"));
    }
}
