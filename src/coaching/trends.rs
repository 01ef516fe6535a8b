// ABOUTME: Derived trend math over newest-first metric series and heart-rate zone bands
// ABOUTME: Shared by prompt construction and the deterministic fallback plan so both agree
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::RecommendationStatus;

/// Direction of change between the oldest and newest reading of a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Higher is better and the value rose
    Improving,
    /// Higher is better and the value fell
    Declining,
    /// Value rose (neutral wording)
    Increasing,
    /// Value fell (neutral wording)
    Decreasing,
    /// No change
    Stable,
}

impl TrendDirection {
    /// Wire and prompt representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

impl Display for TrendDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Oldest-to-latest comparison of one metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    /// Newest reading
    pub latest: f64,
    /// Oldest reading in the window
    pub oldest: f64,
    /// `latest - oldest`
    pub change: f64,
    /// Change relative to `oldest`, 0 when `oldest` is not positive
    pub change_percent: f64,
    /// Direction label
    pub direction: TrendDirection,
}

impl Trend {
    /// Fitness-style trend where a rise is an improvement (VO2 max)
    ///
    /// `series` must be ordered newest first. Returns `None` below two points.
    #[must_use]
    pub fn fitness(series: &[f64]) -> Option<Self> {
        Self::compute(series, TrendDirection::Improving, TrendDirection::Declining)
    }

    /// Level-style trend with neutral increase/decrease wording (heart rate, weight)
    #[must_use]
    pub fn level(series: &[f64]) -> Option<Self> {
        Self::compute(series, TrendDirection::Increasing, TrendDirection::Decreasing)
    }

    fn compute(series: &[f64], up: TrendDirection, down: TrendDirection) -> Option<Self> {
        if series.len() < 2 {
            return None;
        }
        let latest = *series.first()?;
        let oldest = *series.last()?;
        let change = latest - oldest;
        let change_percent = if oldest > 0.0 {
            change / oldest * 100.0
        } else {
            0.0
        };
        let direction = if change > 0.0 {
            up
        } else if change < 0.0 {
            down
        } else {
            TrendDirection::Stable
        };

        Some(Self {
            latest,
            oldest,
            change,
            change_percent,
            direction,
        })
    }
}

/// Count of recent workouts with a human-readable summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutFrequency {
    /// Workouts in the recent window
    pub recent_count: usize,
    /// "{n} workouts in last 3 sessions"
    pub message: String,
}

/// All derived trends for a user context; absent metrics stay `None`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trends {
    /// VO2 max trend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vo2_max: Option<Trend>,
    /// Heart-rate trend over daily averages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<Trend>,
    /// Body weight trend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Trend>,
    /// Recent workout count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_frequency: Option<WorkoutFrequency>,
}

impl Trends {
    /// Compute trends from newest-first series
    #[must_use]
    pub fn calculate(vo2: &[f64], heart_rate: &[f64], weight: &[f64], workouts: usize) -> Self {
        Self {
            vo2_max: Trend::fitness(vo2),
            heart_rate: Trend::level(heart_rate),
            weight: Trend::level(weight),
            workout_frequency: (workouts > 0).then(|| WorkoutFrequency {
                recent_count: workouts,
                message: format!("{workouts} workouts in last 3 sessions"),
            }),
        }
    }

    /// True when no metric produced a trend
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vo2_max.is_none()
            && self.heart_rate.is_none()
            && self.weight.is_none()
            && self.workout_frequency.is_none()
    }
}

// ============================================================================
// Compliance summary
// ============================================================================

/// Status tallies over a window of prior recommendations
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplianceSummary {
    /// Plans in the window
    pub total: usize,
    /// Plans marked completed
    pub completed: usize,
    /// Plans marked partial
    pub partial: usize,
    /// Plans marked skipped
    pub skipped: usize,
    /// `completed / total * 100`, 0 for an empty window
    pub rate: f64,
}

impl ComplianceSummary {
    /// Tally statuses
    #[must_use]
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = RecommendationStatus>,
    {
        let mut summary = Self::default();
        for status in statuses {
            summary.total += 1;
            match status {
                RecommendationStatus::Completed => summary.completed += 1,
                RecommendationStatus::Partial => summary.partial += 1,
                RecommendationStatus::Skipped => summary.skipped += 1,
                RecommendationStatus::Pending => {}
            }
        }
        summary.rate = compliance_rate(summary.completed, summary.total);
        summary
    }
}

/// Completed share of `total` as a percentage
#[must_use]
pub fn compliance_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

// ============================================================================
// Heart-rate zones
// ============================================================================

/// Lowest and highest zone numbers
pub const MIN_ZONE: u8 = 1;
/// Highest training zone
pub const MAX_ZONE: u8 = 5;

/// Age-predicted heart-rate band for one training zone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartRateZone {
    /// Zone number, 1..=5
    pub zone: u8,
    /// Lower bound in bpm (floored)
    pub low_bpm: u32,
    /// Upper bound in bpm (floored)
    pub high_bpm: u32,
}

/// `220 - age`
#[must_use]
pub const fn max_heart_rate(age: u32) -> u32 {
    220_u32.saturating_sub(age)
}

/// Zone N spans `[40 + 10N, 50 + 10N]` percent of max heart rate
///
/// Out-of-range zone numbers are clamped to 1..=5.
#[must_use]
pub fn heart_rate_zone(age: u32, zone: u8) -> HeartRateZone {
    let zone = zone.clamp(MIN_ZONE, MAX_ZONE);
    let max_hr = max_heart_rate(age);
    let low_percent = 40 + 10 * u32::from(zone);
    HeartRateZone {
        zone,
        low_bpm: max_hr * low_percent / 100,
        high_bpm: max_hr * (low_percent + 10) / 100,
    }
}

/// All five zones for an age
#[must_use]
pub fn heart_rate_zones(age: u32) -> Vec<HeartRateZone> {
    (MIN_ZONE..=MAX_ZONE)
        .map(|zone| heart_rate_zone(age, zone))
        .collect()
}

/// Short VO2 trend phrase: "stable", "improving +5.2%" or "declining -3.0%"
///
/// Changes under one percent read as stable.
#[must_use]
pub fn vo2_trend_phrase(trend: Option<&Trend>) -> String {
    match trend {
        Some(trend) if trend.change_percent.abs() >= 1.0 => {
            let label = if trend.change_percent > 0.0 {
                TrendDirection::Improving
            } else {
                TrendDirection::Declining
            };
            format!("{label} {:+.1}%", trend.change_percent)
        }
        _ => TrendDirection::Stable.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trend_without_two_points() {
        assert!(Trend::fitness(&[]).is_none());
        assert!(Trend::fitness(&[45.0]).is_none());
        assert!(Trend::level(&[62.0]).is_none());
        assert!(Trends::calculate(&[], &[], &[], 0).is_empty());
    }

    #[test]
    fn test_vo2_improving_percent() {
        // newest first
        let trend = Trend::fitness(&[46.0, 43.0, 40.0]).unwrap();
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.change - 6.0).abs() < 1e-9);
        assert!((trend.change_percent - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_directions() {
        assert_eq!(
            Trend::level(&[58.0, 62.0]).unwrap().direction,
            TrendDirection::Decreasing
        );
        assert_eq!(
            Trend::level(&[181.0, 180.0]).unwrap().direction,
            TrendDirection::Increasing
        );
        assert_eq!(
            Trend::fitness(&[44.0, 44.0]).unwrap().direction,
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_zero_oldest_does_not_divide() {
        let trend = Trend::level(&[5.0, 0.0]).unwrap();
        assert!(trend.change_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_compliance_rate() {
        let summary = ComplianceSummary::from_statuses([
            RecommendationStatus::Completed,
            RecommendationStatus::Completed,
            RecommendationStatus::Completed,
            RecommendationStatus::Skipped,
            RecommendationStatus::Partial,
        ]);
        assert_eq!(summary.total, 5);
        assert!((summary.rate - 60.0).abs() < 1e-9);
        assert!(compliance_rate(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zone_bands_for_default_age() {
        // max HR 190
        let zone1 = heart_rate_zone(30, 1);
        assert_eq!((zone1.low_bpm, zone1.high_bpm), (95, 114));
        let zone2 = heart_rate_zone(30, 2);
        assert_eq!((zone2.low_bpm, zone2.high_bpm), (114, 133));
        assert_eq!(heart_rate_zones(30).len(), 5);
        assert_eq!(heart_rate_zone(30, 9).zone, MAX_ZONE);
    }

    #[test]
    fn test_trend_phrase() {
        assert_eq!(vo2_trend_phrase(None), "stable");
        let up = Trend::fitness(&[46.0, 40.0]).unwrap();
        assert_eq!(vo2_trend_phrase(Some(&up)), "improving +15.0%");
        let down = Trend::fitness(&[48.5, 50.0]).unwrap();
        assert_eq!(vo2_trend_phrase(Some(&down)), "declining -3.0%");
        let flat = Trend::fitness(&[50.2, 50.0]).unwrap();
        assert_eq!(vo2_trend_phrase(Some(&flat)), "stable");
    }
}
