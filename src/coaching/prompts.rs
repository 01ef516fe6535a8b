// ABOUTME: Builds the daily-plan user prompt from an aggregated coaching context
// ABOUTME: Sections appear in a fixed order with live stats first and compliance history last
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::Write;

use super::context::UserContext;
use super::trends::{heart_rate_zone, vo2_trend_phrase};
use crate::constants::context_windows::PROMPT_PRIOR_PLANS;

/// Weight differences inside this band are reported as stable
const WEIGHT_STABLE_BAND_LBS: f64 = 2.0;

/// Render the user prompt for one plan request
#[must_use]
pub fn build_coaching_prompt(context: &UserContext) -> String {
    let first_name = context.first_name();
    let mut sections = vec![format!(
        "Provide personalized coaching recommendations for {first_name}:\n"
    )];

    sections.push(today_stats_section(context));

    if let Some(intention) = &context.daily_intention {
        let mut section = format!(
            "\n**TODAY'S TRAINING INTENTION:**\n- {}\n",
            intention.intention.describe()
        );
        if let Some(notes) = &intention.notes {
            let _ = writeln!(section, "- Notes: {notes}");
        }
        sections.push(section);
    }

    if let Some(profile) = &context.profile {
        let weight = context
            .latest_weight()
            .map_or_else(|| "Not specified".to_owned(), |w| format!("{:.1}", w.value_lbs));
        sections.push(format!(
            "\n**Athlete Profile:**\n- Name: {first_name}\n- Age: {}\n- Gender: {}\n- Height: {} inches\n- Weight: {weight} lbs\n",
            profile
                .age
                .map_or_else(|| "Not specified".to_owned(), |a| a.to_string()),
            profile.gender.as_deref().unwrap_or("Not specified"),
            profile
                .height_inches
                .map_or_else(|| "Not specified".to_owned(), |h| format!("{h:.1}")),
        ));
    }

    if !context.medical_conditions.is_empty() {
        let lines: Vec<String> = context
            .medical_conditions
            .iter()
            .map(|mc| match &mc.notes {
                Some(notes) => format!("- {} ({notes})", mc.name),
                None => format!("- {}", mc.name),
            })
            .collect();
        sections.push(format!("\n**Medical Conditions:**\n{}\n", lines.join("\n")));
    }

    if !context.active_injuries.is_empty() {
        let lines: Vec<String> = context
            .active_injuries
            .iter()
            .map(|i| {
                let pain = i
                    .current_pain_level
                    .map_or_else(|| "?".to_owned(), |p| p.to_string());
                format!(
                    "- {} ({}): {}, pain {pain}/10, {}",
                    i.injury_type, i.affected_area, i.severity_level, i.status
                )
            })
            .collect();
        sections.push(format!("\n**Active Injuries:**\n{}\n", lines.join("\n")));
    }

    if context.goals.is_empty() {
        sections.push("\n**Goals:** Not specified yet\n".to_owned());
    } else {
        let lines: Vec<String> = context
            .goals
            .iter()
            .map(|g| {
                format!(
                    "- {}: {} (Target: {} {})",
                    g.goal_type,
                    g.description.as_deref().unwrap_or("No description"),
                    g.target_value
                        .map_or_else(|| "None".to_owned(), |v| v.to_string()),
                    g.target_unit.as_deref().unwrap_or(""),
                )
                .trim_end()
                .to_owned()
            })
            .collect();
        sections.push(format!("\n**Goals:**\n{}\n", lines.join("\n")));
    }

    if let Some(prefs) = &context.training_preferences {
        sections.push(format!(
            "\n**Training Preferences:**\n- Experience level: {}\n- Frequency: {} days/week\n- Sessions per day: {}\n- Preferred time: {}\n",
            prefs.training_level,
            prefs
                .days_per_week
                .map_or_else(|| "Not specified".to_owned(), |d| d.to_string()),
            prefs
                .sessions_per_day
                .map_or_else(|| "Not specified".to_owned(), |s| s.to_string()),
            prefs.preferred_time_window.as_deref().unwrap_or("Flexible"),
        ));
    }

    if let Some(weight) = context.latest_weight() {
        sections.push(format!(
            "\n**Weight:**\n- Current: {:.1} lbs\n- Trend: {}\n",
            weight.value_lbs,
            weight_trend_text(context)
        ));
    }

    if !context.vo2_history.is_empty() {
        let lines: Vec<String> = context
            .vo2_history
            .iter()
            .map(|v| {
                format!(
                    "  - {}: {:.1} ml/kg/min",
                    v.measured_at.format("%Y-%m-%d"),
                    v.ml_per_kg_min
                )
            })
            .collect();
        sections.push(format!(
            "\n**VO₂max (Last 3 Readings):**\n{}\n",
            lines.join("\n")
        ));
    }

    if !context.heart_rate_days.is_empty() {
        let lines: Vec<String> = context
            .heart_rate_days
            .iter()
            .map(|d| {
                format!(
                    "  - {}: Avg {:.0} bpm (Range: {}-{} bpm, {} samples)",
                    d.date, d.avg_bpm, d.min_bpm, d.max_bpm, d.samples
                )
            })
            .collect();
        sections.push(format!(
            "\n**Heart Rate (Last 3 Days):**\n{}\n",
            lines.join("\n")
        ));
    }

    if !context.workouts.is_empty() {
        let lines: Vec<String> = context
            .workouts
            .iter()
            .map(|w| {
                let mut line = format!(
                    "  - {}: {} - {:.0} min",
                    w.start_time.format("%Y-%m-%d"),
                    w.activity_type,
                    w.duration_minutes()
                );
                if let Some(miles) = w.distance_miles.filter(|m| *m > 0.0) {
                    let _ = write!(line, ", {miles:.1} miles");
                }
                if let Some(calories) = w.calories.filter(|c| *c > 0.0) {
                    let _ = write!(line, ", {calories:.0} cal");
                }
                if let Some(hr) = w.avg_heart_rate {
                    let _ = write!(line, ", Avg HR: {hr} bpm");
                }
                line
            })
            .collect();
        sections.push(format!(
            "\n**Recent Workouts (Last 3):**\n{}\n",
            lines.join("\n")
        ));
    }

    if !context.step_days.is_empty() {
        let lines: Vec<String> = context
            .step_days
            .iter()
            .map(|s| format!("  - {}: {} steps", s.date, format_thousands(s.total_steps)))
            .collect();
        sections.push(format!(
            "\n**Daily Steps (Last 3 Days):**\n{}\n",
            lines.join("\n")
        ));
    }

    if !context.sleep.is_empty() {
        let lines: Vec<String> = context
            .sleep
            .iter()
            .map(|s| {
                let mut line = format!(
                    "  - {}: {:.1} hours",
                    s.start_time.format("%Y-%m-%d"),
                    s.duration_hours()
                );
                if let Some(score) = s.score {
                    let _ = write!(line, " (score {score})");
                }
                line
            })
            .collect();
        sections.push(format!(
            "\n**Sleep (Last 3 Sessions):**\n{}\n",
            lines.join("\n")
        ));
    }

    if let Some(section) = trends_section(context) {
        sections.push(section);
    }

    if !context.previous_recommendations.is_empty() {
        sections.push(compliance_section(context));
    }

    sections.push(format!(
        "\nPlease provide comprehensive, personalized coaching recommendations for {first_name} based on all this data."
    ));

    sections.join("\n")
}

fn today_stats_section(context: &UserContext) -> String {
    let stats = &context.today_stats;
    let zone = heart_rate_zone(context.age(), 1);
    format!(
        "\n**TODAY'S CURRENT STATS:**\n- Steps so far: {}\n- Average Heart Rate: {} bpm\n- Workouts completed: {}\n- Latest VO₂ Max: {} ml/kg/min ({})\n- Zone 1 for age {}: {}-{} BPM\n",
        format_thousands(stats.steps),
        stats
            .avg_heart_rate
            .map_or_else(|| "No data yet".to_owned(), |hr| hr.to_string()),
        stats.workout_count,
        stats
            .vo2_max
            .map_or_else(|| "Not available".to_owned(), |v| format!("{v:.1}")),
        vo2_trend_phrase(context.trends.vo2_max.as_ref()),
        context.age(),
        zone.low_bpm,
        zone.high_bpm,
    )
}

fn weight_trend_text(context: &UserContext) -> String {
    let history = &context.weight_history;
    if history.len() < 2 {
        return "stable".to_owned();
    }
    let (Some(recent), Some(older)) = (history.first(), history.last()) else {
        return "stable".to_owned();
    };
    let diff = recent.value_lbs - older.value_lbs;
    if diff < -WEIGHT_STABLE_BAND_LBS {
        format!("decreasing ({:.1} lbs)", diff.abs())
    } else if diff > WEIGHT_STABLE_BAND_LBS {
        format!("increasing ({diff:.1} lbs)")
    } else {
        "stable".to_owned()
    }
}

fn trends_section(context: &UserContext) -> Option<String> {
    let trends = &context.trends;
    let mut lines = Vec::new();

    if let Some(vo2) = &trends.vo2_max {
        lines.push(format!(
            "- VO₂ Max: {:.1} → {:.1} ml/kg/min ({:+.1} ml/kg/min ({:+.1}%)) - {}",
            vo2.oldest, vo2.latest, vo2.change, vo2.change_percent, vo2.direction
        ));
    }
    if let Some(hr) = &trends.heart_rate {
        lines.push(format!(
            "- Resting HR: {:.0} → {:.0} bpm ({:+.0} bpm) - {}",
            hr.oldest, hr.latest, hr.change, hr.direction
        ));
    }
    if let Some(weight) = &trends.weight {
        lines.push(format!(
            "- Weight: {:.1} → {:.1} lbs ({:+.1} lbs) - {}",
            weight.oldest, weight.latest, weight.change, weight.direction
        ));
    }
    if let Some(frequency) = &trends.workout_frequency {
        lines.push(format!("- Recent activity: {}", frequency.message));
    }

    if lines.is_empty() {
        return None;
    }
    Some(format!(
        "\n**RECENT PROGRESS & TRENDS:**\n{}\n\nIMPORTANT: Reference these specific trends in your recommendations! Mention improving/declining metrics by name with numbers.\n",
        lines.join("\n")
    ))
}

fn compliance_section(context: &UserContext) -> String {
    let summary = context.compliance();
    let lines: Vec<String> = context
        .previous_recommendations
        .iter()
        .take(PROMPT_PRIOR_PLANS)
        .map(|r| {
            let mut line = format!(
                "  - {}: {} ({} min) - {}",
                r.date,
                r.workout_type.map_or("No workout", |t| t.as_str()),
                r.duration_minutes.unwrap_or(0),
                r.status.as_str().to_uppercase()
            );
            if let Some(notes) = &r.compliance_notes {
                let _ = write!(line, " ({notes})");
            }
            line
        })
        .collect();

    format!(
        "\n**PREVIOUS RECOMMENDATIONS & COMPLIANCE (Last 7 Days):**\n- Compliance Rate: {:.0}% ({} completed, {} partial, {} skipped out of {})\n{}\n\nCRITICAL: Use this history to:\n1. Acknowledge what the athlete actually did\n2. Adjust difficulty based on compliance (consistent completion = increase intensity, frequent skipping = easier workouts)\n3. Reference specific past recommendations\n",
        summary.rate,
        summary.completed,
        summary.partial,
        summary.skipped,
        summary.total,
        lines.join("\n")
    )
}

/// `12345` → `"12,345"`
#[must_use]
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::coaching::context::PriorRecommendation;
    use crate::models::{
        DailyIntention, RecommendationStatus, TrainingIntention, UserProfile, Vo2MaxEstimate,
        WorkoutType,
    };

    fn vo2(day: u32, value: f64) -> Vo2MaxEstimate {
        Vo2MaxEstimate {
            id: format!("v{day}"),
            user_id: "u1".to_owned(),
            provider: "apple_health".to_owned(),
            source_record_id: None,
            measured_at: Utc.with_ymd_and_hms(2025, 3, day, 7, 0, 0).unwrap(),
            ml_per_kg_min: value,
            estimation_method: None,
        }
    }

    #[test]
    fn test_thousands_separator() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(12_345), "12,345");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_new_user_prompt_has_defaults() {
        let prompt = build_coaching_prompt(&UserContext::empty("u1"));
        assert!(prompt.starts_with("Provide personalized coaching recommendations for Athlete:"));
        assert!(prompt.contains("- Steps so far: 0"));
        assert!(prompt.contains("No data yet"));
        assert!(prompt.contains("Not available"));
        assert!(prompt.contains("**Goals:** Not specified yet"));
        assert!(!prompt.contains("PREVIOUS RECOMMENDATIONS"));
        assert!(!prompt.contains("RECENT PROGRESS"));
    }

    #[test]
    fn test_sections_in_order_with_trends_and_compliance() {
        let mut context = UserContext::empty("u1");
        context.profile = Some(UserProfile {
            user_id: "u1".to_owned(),
            first_name: Some("Sarah".to_owned()),
            last_name: None,
            gender: Some("female".to_owned()),
            birth_date: None,
            age: Some(40),
            height_inches: Some(65.0),
        });
        context.daily_intention = Some(DailyIntention {
            user_id: "u1".to_owned(),
            intention_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            intention: TrainingIntention::No,
            notes: Some("legs sore".to_owned()),
        });
        context.vo2_history = vec![vo2(13, 46.0), vo2(10, 40.0)];
        context.today_stats.steps = 4321;
        context.previous_recommendations = vec![PriorRecommendation {
            date: NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            workout_type: Some(WorkoutType::Run),
            duration_minutes: Some(30),
            status: RecommendationStatus::Completed,
            compliance_notes: Some("Completed: running, 32 min".to_owned()),
        }];
        context.refresh_trends();

        let prompt = build_coaching_prompt(&context);
        let header = prompt.find("for Sarah:").unwrap();
        let stats = prompt.find("TODAY'S CURRENT STATS").unwrap();
        let intention = prompt.find("NO - rest/recovery day").unwrap();
        let profile = prompt.find("**Athlete Profile:**").unwrap();
        let trends = prompt.find("RECENT PROGRESS & TRENDS").unwrap();
        let compliance = prompt.find("Compliance Rate: 100% (1 completed").unwrap();
        assert!(header < stats && stats < intention && intention < profile);
        assert!(profile < trends && trends < compliance);

        assert!(prompt.contains("- Steps so far: 4,321"));
        assert!(prompt.contains("- Notes: legs sore"));
        assert!(prompt.contains("40.0 → 46.0 ml/kg/min (+6.0 ml/kg/min (+15.0%)) - improving"));
        assert!(prompt.contains("run (30 min) - COMPLETED (Completed: running, 32 min)"));
        // max HR 180 for age 40
        assert!(prompt.contains("Zone 1 for age 40: 90-108 BPM"));
    }
}
