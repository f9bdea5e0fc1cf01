// SPDX-License-Identifier: MIT

//! Badge catalog: fixed rule set with store-backed XP overrides.

use serde::{Deserialize, Serialize};

/// Event that causes a set of badge rules to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTrigger {
    OnProfileSave,
    OnSignup,
    OnValidation,
    OnBadgeGranted,
}

/// Predicate deciding whether a badge is earned. Tagged variants, closed
/// set; rule parameters live in the catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BadgeRule {
    /// Profile completeness predicate on the member snapshot
    CompleteProfile,
    /// Member has no prior validation before the current one
    FirstValidation,
    /// Member has at least `count` validations
    Validations { count: u32 },
    /// At least `count` members signed up with this member's code
    ReferralsGiven { count: u32 },
    /// This member signed up with someone's code
    ReferralReceived,
    /// Member has accumulated at least `threshold` XP
    XpThreshold { threshold: u64 },
}

/// Catalog entry for one badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDefinition {
    /// Document ID within the catalog; also the ID stored in `member.badges`
    pub id: String,
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// XP credited when the badge is granted. The catalog value is
    /// authoritative; the built-in defaults only seed fresh deployments.
    pub xp_reward: u32,
    pub trigger: BadgeTrigger,
    #[serde(flatten)]
    pub rule: BadgeRule,
}

/// Built-in catalog, in evaluation order per trigger.
pub fn default_catalog() -> Vec<BadgeDefinition> {
    fn badge(
        id: &str,
        category_id: &str,
        name: &str,
        xp_reward: u32,
        trigger: BadgeTrigger,
        rule: BadgeRule,
    ) -> BadgeDefinition {
        BadgeDefinition {
            id: id.to_string(),
            category_id: category_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            xp_reward,
            trigger,
            rule,
        }
    }

    vec![
        badge(
            "complete_profile",
            "profile",
            "All About You",
            20,
            BadgeTrigger::OnProfileSave,
            BadgeRule::CompleteProfile,
        ),
        badge(
            "referral_received",
            "community",
            "Invited Aboard",
            10,
            BadgeTrigger::OnSignup,
            BadgeRule::ReferralReceived,
        ),
        badge(
            "referral_given_1",
            "community",
            "Connector",
            15,
            BadgeTrigger::OnSignup,
            BadgeRule::ReferralsGiven { count: 1 },
        ),
        badge(
            "referral_given_5",
            "community",
            "Ambassador",
            30,
            BadgeTrigger::OnSignup,
            BadgeRule::ReferralsGiven { count: 5 },
        ),
        badge(
            "first_validation",
            "participation",
            "First Steps",
            10,
            BadgeTrigger::OnValidation,
            BadgeRule::FirstValidation,
        ),
        badge(
            "validations_5",
            "participation",
            "Regular Volunteer",
            15,
            BadgeTrigger::OnValidation,
            BadgeRule::Validations { count: 5 },
        ),
        badge(
            "validations_10",
            "participation",
            "Dedicated Volunteer",
            25,
            BadgeTrigger::OnValidation,
            BadgeRule::Validations { count: 10 },
        ),
        badge(
            "validations_25",
            "participation",
            "Veteran Volunteer",
            50,
            BadgeTrigger::OnValidation,
            BadgeRule::Validations { count: 25 },
        ),
        badge(
            "xp_100",
            "milestones",
            "Rising Star",
            10,
            BadgeTrigger::OnBadgeGranted,
            BadgeRule::XpThreshold { threshold: 100 },
        ),
        badge(
            "xp_500",
            "milestones",
            "Shining Star",
            25,
            BadgeTrigger::OnBadgeGranted,
            BadgeRule::XpThreshold { threshold: 500 },
        ),
        badge(
            "xp_1000",
            "milestones",
            "Superstar",
            50,
            BadgeTrigger::OnBadgeGranted,
            BadgeRule::XpThreshold { threshold: 1000 },
        ),
    ]
}
