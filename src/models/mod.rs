// ABOUTME: Core data models for athletes, health samples, coaching plans and injuries
// ABOUTME: Re-exports the profile, health, coaching and injury model modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Plain data carried between the database layer, the coaching engine and the
//! HTTP surface. Enumerations stored as text expose `as_str()` for binding and
//! `FromStr` for decoding; an unknown value is an `INVALID_INPUT` error.
//!
//! - [`profile`]: athlete profile, goals, preferences, weight, intentions
//! - [`health`]: wearable samples and their daily aggregates
//! - [`coaching`]: recommendations, their lifecycle and agent sessions
//! - [`injury`]: injuries, their status machine and timeline entries

pub mod coaching;
pub mod health;
pub mod injury;
pub mod profile;

pub use coaching::{
    CoachingRecommendation, CoachingSession, RecommendationDraft, RecommendationStatus,
    RecommendationUpdate, WorkoutDetails, WorkoutType,
};
pub use health::{
    HeartRateDay, HeartRateSample, SleepSession, StepDay, StepMinute, Vo2MaxEstimate,
    WorkoutSession,
};
pub use injury::{
    ImprovementLevel, InjuryChange, InjuryStatus, InjurySeverity, InjuryUpdate, NewInjury,
    UserInjury,
};
pub use profile::{
    DailyIntention, MedicalCondition, TrainingIntention, TrainingPreferences, UserGoal,
    UserProfile, WeightMeasurement,
};
