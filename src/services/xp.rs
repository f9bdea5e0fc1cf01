// SPDX-License-Identifier: MIT

//! Deterministic XP scoring for activities.
//!
//! Pure and total: every `(type, category, scores, frequency)` combination
//! maps to an integer reward of at least [`MIN_XP`]. Events are worth a
//! fixed amount regardless of their other attributes.

use crate::models::activity::{ActivityType, Frequency};

/// Fixed reward for event participation.
pub const EVENT_XP: u32 = 15;

/// Lower bound on any computed reward.
pub const MIN_XP: u32 = 5;

/// Base XP when the category is unknown.
const FALLBACK_BASE: f64 = 18.0;

/// Scores outside 0..=100 (or missing) are treated as this midpoint.
const DEFAULT_SCORE: f64 = 50.0;

/// Compute the XP reward for an activity.
pub fn xp_of(
    activity_type: ActivityType,
    category: &str,
    time_commitment: Option<f64>,
    complexity: Option<f64>,
    frequency: Frequency,
) -> u32 {
    if activity_type == ActivityType::Event {
        return EVENT_XP;
    }

    let base = base_xp(category);
    let time_mul = time_multiplier(sanitize_score(time_commitment));
    let complexity_mul = complexity_multiplier(sanitize_score(complexity));
    let role_mul = if frequency == Frequency::Role { 1.5 } else { 1.0 };

    let raw = base * time_mul * complexity_mul * role_mul;
    // half-up rounding
    let rounded = (raw + 0.5).floor() as u32;
    rounded.max(MIN_XP)
}

/// Category base lookup: four tiers plus a fallback.
fn base_xp(category: &str) -> f64 {
    match category {
        // High-skill remote work
        "consulting" => 30.0,
        "architecture" => 28.0,
        "translation" => 25.0,
        "education" => 25.0,
        // Medium
        "website" => 23.0,
        "photovideo" => 22.0,
        "teaching" => 22.0,
        "fundraising" => 21.0,
        "onlinesupport" => 20.0,
        "sns" => 20.0,
        "explainer" => 20.0,
        "flyer" => 20.0,
        "logo" => 20.0,
        // Simple
        "dataentry" => 12.0,
        "cleaning" => 13.0,
        "administrative" => 14.0,
        // Local defaults
        "food_distribution" => 18.0,
        "elderly_support" => 18.0,
        "animal_care" => 17.0,
        "environment" => 17.0,
        "community_events" => 16.0,
        "childcare" => 18.0,
        "manual_labor" => 16.0,
        _ => FALLBACK_BASE,
    }
}

fn sanitize_score(score: Option<f64>) -> f64 {
    match score {
        Some(s) if (0.0..=100.0).contains(&s) => s,
        _ => DEFAULT_SCORE,
    }
}

fn time_multiplier(s: f64) -> f64 {
    if s <= 20.0 {
        0.7
    } else if s <= 40.0 {
        0.9
    } else if s <= 60.0 {
        1.0
    } else if s <= 80.0 {
        1.4
    } else {
        2.0
    }
}

fn complexity_multiplier(s: f64) -> f64 {
    if s <= 30.0 {
        0.8
    } else if s <= 60.0 {
        1.0
    } else {
        1.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn online_consulting_high_scores() {
        // 30 * 1.4 * 1.5 = 63
        let xp = xp_of(
            ActivityType::Online,
            "consulting",
            Some(70.0),
            Some(75.0),
            Frequency::Once,
        );
        assert_eq!(xp, 63);
    }

    #[test]
    fn events_are_fixed_regardless_of_attributes() {
        let xp = xp_of(
            ActivityType::Event,
            "consulting",
            Some(100.0),
            Some(100.0),
            Frequency::Role,
        );
        assert_eq!(xp, EVENT_XP);
    }

    #[test]
    fn role_frequency_multiplies() {
        // 25 * 1.0 * 1.0 * 1.5 = 37.5 -> 38
        let xp = xp_of(
            ActivityType::Online,
            "translation",
            Some(50.0),
            Some(50.0),
            Frequency::Role,
        );
        assert_eq!(xp, 38);
    }

    #[test]
    fn low_scores_clamp_to_minimum() {
        // 12 * 0.7 * 0.8 = 6.72 -> 7, above the floor
        let xp = xp_of(
            ActivityType::Online,
            "dataentry",
            Some(10.0),
            Some(10.0),
            Frequency::Once,
        );
        assert_eq!(xp, 7);
        assert!(xp >= MIN_XP);
    }

    #[test]
    fn missing_scores_default_to_midpoint() {
        // 18 * 1.0 * 1.0 = 18
        let xp = xp_of(ActivityType::Local, "unknown_category", None, None, Frequency::Once);
        assert_eq!(xp, 18);
    }

    #[test]
    fn out_of_range_scores_default_to_midpoint() {
        let in_range = xp_of(
            ActivityType::Online,
            "website",
            Some(50.0),
            Some(50.0),
            Frequency::Once,
        );
        let out_of_range = xp_of(
            ActivityType::Online,
            "website",
            Some(150.0),
            Some(-3.0),
            Frequency::Once,
        );
        assert_eq!(in_range, out_of_range);
    }

    #[test]
    fn multiplier_step_boundaries() {
        assert_eq!(time_multiplier(20.0), 0.7);
        assert_eq!(time_multiplier(20.1), 0.9);
        assert_eq!(time_multiplier(60.0), 1.0);
        assert_eq!(time_multiplier(80.0), 1.4);
        assert_eq!(time_multiplier(80.1), 2.0);
        assert_eq!(complexity_multiplier(30.0), 0.8);
        assert_eq!(complexity_multiplier(60.0), 1.0);
        assert_eq!(complexity_multiplier(60.1), 1.5);
    }

    proptest! {
        /// Total over the whole input domain and never below the floor.
        #[test]
        fn total_and_floored(
            type_idx in 0..3usize,
            category in "[a-z_]{0,20}",
            tc in proptest::option::of(-50.0..200.0f64),
            cx in proptest::option::of(-50.0..200.0f64),
            freq_idx in 0..3usize,
        ) {
            let activity_type = [ActivityType::Online, ActivityType::Local, ActivityType::Event][type_idx];
            let frequency = [Frequency::Once, Frequency::Regular, Frequency::Role][freq_idx];
            let xp = xp_of(activity_type, &category, tc, cx, frequency);
            prop_assert!(xp >= MIN_XP);
            // Deterministic: same inputs, same output.
            prop_assert_eq!(xp, xp_of(activity_type, &category, tc, cx, frequency));
        }
    }
}
