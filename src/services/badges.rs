// SPDX-License-Identifier: MIT

//! Badge rule engine.
//!
//! Evaluates the badge catalog against a member snapshot whenever a trigger
//! fires. Grants go through a transaction that adds the badge, credits its
//! XP and appends a ledger entry, so each (member, badge) pair is credited
//! at most once no matter how often triggers re-fire.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::badge::{default_catalog, BadgeDefinition, BadgeRule, BadgeTrigger};
use crate::models::Member;
use crate::services::notifications::{NotificationContent, NotificationService};

/// Member snapshot plus the counts rules may consult.
struct RuleContext {
    member: Member,
    validation_count: usize,
    referrals_given: usize,
}

/// Badge rule engine with a cached catalog.
#[derive(Clone)]
pub struct BadgeEngine {
    db: FirestoreDb,
    notifier: NotificationService,
    /// Catalog overrides loaded from the store, keyed by badge id
    overrides: Arc<DashMap<String, BadgeDefinition>>,
    overrides_loaded: Arc<AtomicBool>,
}

impl BadgeEngine {
    pub fn new(db: FirestoreDb, notifier: NotificationService) -> Self {
        Self {
            db,
            notifier,
            overrides: Arc::new(DashMap::new()),
            overrides_loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run all rules bound to a trigger for one member.
    ///
    /// Each grant re-enters `on_badge_granted` evaluation. A validation run
    /// enters it up front as well: the validation already credited XP before
    /// the trigger fired, so milestone rules see the fresh total. Grants are
    /// at-most-once per badge, which bounds the cascade by the catalog size;
    /// a round guard backstops that. Returns newly granted badge ids in
    /// grant order.
    pub async fn run_trigger(&self, member_id: &str, trigger: BadgeTrigger) -> Result<Vec<String>> {
        let catalog = self.effective_catalog().await;
        let mut granted = Vec::new();

        let mut pending = vec![trigger];
        if trigger == BadgeTrigger::OnValidation {
            pending.insert(0, BadgeTrigger::OnBadgeGranted);
        }

        let max_rounds = catalog.len() * 2 + 2;
        let mut rounds = 0;

        while let Some(current) = pending.pop() {
            rounds += 1;
            if rounds > max_rounds {
                tracing::warn!(member_id, "Badge cascade bound reached");
                break;
            }

            let rules: Vec<&BadgeDefinition> =
                catalog.iter().filter(|d| d.trigger == current).collect();
            if rules.is_empty() {
                continue;
            }

            // Fresh snapshot per round: earlier grants may have changed XP.
            let Some(ctx) = self.load_context(member_id).await? else {
                tracing::warn!(member_id, "Badge evaluation skipped, member missing");
                return Ok(granted);
            };

            let mut cascaded = false;
            for def in rules {
                if ctx.member.has_badge(&def.id) || !rule_holds(&def.rule, &ctx) {
                    continue;
                }

                if self.db.grant_badge_atomic(member_id, def).await? {
                    granted.push(def.id.clone());
                    self.notifier
                        .dispatch_best_effort(
                            member_id,
                            NotificationContent::badge_earned(&def.name, def.xp_reward),
                        )
                        .await;
                    cascaded = true;
                }
            }

            if cascaded {
                pending.push(BadgeTrigger::OnBadgeGranted);
            }
        }

        Ok(granted)
    }

    async fn load_context(&self, member_id: &str) -> Result<Option<RuleContext>> {
        let Some(member) = self.db.get_member(member_id).await? else {
            return Ok(None);
        };
        let validation_count = self.db.count_validations_for_member(member_id).await?;
        let referrals_given = self.db.count_members_referred_by(&member.code).await?;
        Ok(Some(RuleContext {
            member,
            validation_count,
            referrals_given,
        }))
    }

    /// Built-in catalog with store overrides applied. The stored XP value
    /// wins over the built-in one; store-only badges are appended.
    async fn effective_catalog(&self) -> Vec<BadgeDefinition> {
        self.ensure_overrides_loaded().await;

        let mut catalog = default_catalog();
        for def in catalog.iter_mut() {
            if let Some(stored) = self.overrides.get(&def.id) {
                *def = stored.clone();
            }
        }

        let known: HashSet<String> = catalog.iter().map(|d| d.id.clone()).collect();
        let mut extra: Vec<BadgeDefinition> = self
            .overrides
            .iter()
            .filter(|entry| !known.contains(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        extra.sort_by(|a, b| a.id.cmp(&b.id));
        catalog.extend(extra);
        catalog
    }

    async fn ensure_overrides_loaded(&self) {
        if self.overrides_loaded.load(Ordering::Acquire) {
            return;
        }
        match self.db.list_badge_catalog().await {
            Ok(stored) => {
                for def in stored {
                    self.overrides.insert(def.id.clone(), def);
                }
                self.overrides_loaded.store(true, Ordering::Release);
                tracing::info!(count = self.overrides.len(), "Badge catalog overrides loaded");
            }
            Err(e) => {
                // Defaults still apply; retried on the next evaluation.
                tracing::debug!(error = %e, "Badge catalog unavailable, using built-in defaults");
            }
        }
    }
}

/// Evaluate one rule against a snapshot.
fn rule_holds(rule: &BadgeRule, ctx: &RuleContext) -> bool {
    match rule {
        BadgeRule::CompleteProfile => ctx.member.profile_complete(),
        BadgeRule::FirstValidation => ctx.validation_count == 1,
        BadgeRule::Validations { count } => ctx.validation_count >= *count as usize,
        BadgeRule::ReferralsGiven { count } => ctx.referrals_given >= *count as usize,
        BadgeRule::ReferralReceived => ctx.member.referred_by.is_some(),
        BadgeRule::XpThreshold { threshold } => ctx.member.xp >= *threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationPreferences;

    fn member_with(xp: u64, referred_by: Option<&str>) -> Member {
        Member {
            uid: "m1".to_string(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            bio: "bio".to_string(),
            cause: "education".to_string(),
            hobbies: "chess".to_string(),
            country: "FR".to_string(),
            profile_picture: Some("https://example.com/p.jpg".to_string()),
            languages: vec!["en".to_string()],
            time_commitment: vec!["1-2h".to_string()],
            availability: vec!["weekends".to_string()],
            xp,
            badges: vec![],
            code: "ADA1X".to_string(),
            referred_by: referred_by.map(String::from),
            notification_preferences: NotificationPreferences::default(),
            fcm_tokens: vec![],
            created_at: "2025-01-01T00:00:00Z".to_string(),
            last_active: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn ctx(member: Member, validations: usize, referrals: usize) -> RuleContext {
        RuleContext {
            member,
            validation_count: validations,
            referrals_given: referrals,
        }
    }

    #[test]
    fn first_validation_only_on_exactly_one() {
        let c = ctx(member_with(0, None), 1, 0);
        assert!(rule_holds(&BadgeRule::FirstValidation, &c));
        let c = ctx(member_with(0, None), 2, 0);
        assert!(!rule_holds(&BadgeRule::FirstValidation, &c));
        let c = ctx(member_with(0, None), 0, 0);
        assert!(!rule_holds(&BadgeRule::FirstValidation, &c));
    }

    #[test]
    fn validation_thresholds() {
        let c = ctx(member_with(0, None), 10, 0);
        assert!(rule_holds(&BadgeRule::Validations { count: 5 }, &c));
        assert!(rule_holds(&BadgeRule::Validations { count: 10 }, &c));
        assert!(!rule_holds(&BadgeRule::Validations { count: 25 }, &c));
    }

    #[test]
    fn referral_rules() {
        let c = ctx(member_with(0, Some("FRND1")), 0, 0);
        assert!(rule_holds(&BadgeRule::ReferralReceived, &c));
        assert!(!rule_holds(&BadgeRule::ReferralsGiven { count: 1 }, &c));

        let c = ctx(member_with(0, None), 0, 5);
        assert!(!rule_holds(&BadgeRule::ReferralReceived, &c));
        assert!(rule_holds(&BadgeRule::ReferralsGiven { count: 5 }, &c));
    }

    #[test]
    fn xp_thresholds_inclusive() {
        let c = ctx(member_with(100, None), 0, 0);
        assert!(rule_holds(&BadgeRule::XpThreshold { threshold: 100 }, &c));
        assert!(!rule_holds(&BadgeRule::XpThreshold { threshold: 101 }, &c));
    }

    #[test]
    fn complete_profile_uses_member_predicate() {
        let c = ctx(member_with(0, None), 0, 0);
        assert!(rule_holds(&BadgeRule::CompleteProfile, &c));

        let mut incomplete = member_with(0, None);
        incomplete.country.clear();
        let c = ctx(incomplete, 0, 0);
        assert!(!rule_holds(&BadgeRule::CompleteProfile, &c));
    }
}
