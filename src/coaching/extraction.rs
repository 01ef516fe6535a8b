// ABOUTME: Pattern extraction of query-friendly workout fields from free-text training plans
// ABOUTME: Pure text to WorkoutDetails mapping used by the recommendation store on every write
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Lossy extraction of structured columns from a plan's "today's training" text.
//!
//! The free text stays the source of truth for display; these fields only
//! make plans filterable and feed the compliance matcher.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{WorkoutDetails, WorkoutType};

// Checked in this order; the first keyword found decides the type
static WORKOUT_TYPE_PATTERNS: LazyLock<Vec<(WorkoutType, Regex)>> = LazyLock::new(|| {
    [
        (WorkoutType::Run, r"(?i)\b(run|jog|running|jogging)\b"),
        (WorkoutType::Walk, r"(?i)\b(walk|walking)\b"),
        (WorkoutType::Cycling, r"(?i)\b(cycl\w*|bike|biking)\b"),
        (WorkoutType::Rest, r"(?i)\b(rest|recovery)\b"),
        (WorkoutType::Interval, r"(?i)\b(intervals?|HIIT)\b"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
    .collect()
});

static DURATION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 30-min, 30 min, 45 minutes, 20min
    Regex::new(r"(?i)(\d+)[\s-]?(min|minute)").ok()
});

static ZONE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)Zone\s+(\d+)").ok());

static HEART_RATE_RANGE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // Matches: 140-150 BPM, (80–90 bpm)
    Regex::new(r"(?i)(\d+)[-–](\d+)\s*bpm").ok()
});

/// Extract workout type, duration, zone and heart-rate range from plan text
///
/// Fields with no match stay `None`.
#[must_use]
pub fn extract_workout_details(training_text: &str) -> WorkoutDetails {
    if training_text.trim().is_empty() {
        return WorkoutDetails::default();
    }

    WorkoutDetails {
        workout_type: extract_workout_type(training_text),
        duration_minutes: DURATION_PATTERN
            .as_ref()
            .and_then(|re| re.captures(training_text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        intensity_zone: ZONE_PATTERN
            .as_ref()
            .and_then(|re| re.captures(training_text))
            .and_then(|caps| caps.get(1))
            .map(|m| format!("zone_{}", m.as_str())),
        heart_rate_range: HEART_RATE_RANGE_PATTERN
            .as_ref()
            .and_then(|re| re.captures(training_text))
            .and_then(|caps| match (caps.get(1), caps.get(2)) {
                (Some(low), Some(high)) => Some(format!("{}-{}", low.as_str(), high.as_str())),
                _ => None,
            }),
    }
}

/// First workout keyword found, in run, walk, cycling, rest, interval order
#[must_use]
pub fn extract_workout_type(text: &str) -> Option<WorkoutType> {
    WORKOUT_TYPE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(kind, _)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_fields_from_typical_plan() {
        let details = extract_workout_details("30-min easy run, Zone 2 (140-150 BPM)");
        assert_eq!(details.workout_type, Some(WorkoutType::Run));
        assert_eq!(details.duration_minutes, Some(30));
        assert_eq!(details.intensity_zone.as_deref(), Some("zone_2"));
        assert_eq!(details.heart_rate_range.as_deref(), Some("140-150"));
    }

    #[test]
    fn test_no_patterns_yields_empty_details() {
        assert_eq!(
            extract_workout_details("Listen to your body today."),
            WorkoutDetails::default()
        );
        assert_eq!(extract_workout_details(""), WorkoutDetails::default());
    }

    #[test]
    fn test_first_listed_type_wins() {
        // "walk" and "recovery" both present; walk is checked before rest
        assert_eq!(
            extract_workout_type("Recovery day: a gentle walk"),
            Some(WorkoutType::Walk)
        );
        assert_eq!(
            extract_workout_type("45 minutes of cycling"),
            Some(WorkoutType::Cycling)
        );
        assert_eq!(extract_workout_type("HIIT session"), Some(WorkoutType::Interval));
    }

    #[test]
    fn test_word_boundaries_are_respected() {
        // "running" matches, "brunch" and "prune" must not
        assert_eq!(extract_workout_type("brunch then prune roses"), None);
        assert_eq!(extract_workout_type("Keep running"), Some(WorkoutType::Run));
    }

    #[test]
    fn test_duration_variants() {
        for (text, expected) in [
            ("20min stroll", 20),
            ("a 45 minute ride", 45),
            ("60-minute tempo", 60),
        ] {
            assert_eq!(
                extract_workout_details(text).duration_minutes,
                Some(expected),
                "{text}"
            );
        }
    }

    #[test]
    fn test_heart_rate_range_accepts_en_dash_and_lowercase() {
        let details = extract_workout_details("Keep it at 95–114 bpm");
        assert_eq!(details.heart_rate_range.as_deref(), Some("95-114"));
    }
}
