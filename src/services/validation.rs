// SPDX-License-Identifier: MIT

//! Validation state machine.
//!
//! Handles the core workflow:
//! 1. Check preconditions in order (activity, token, date window, duplicate)
//! 2. Commit one transaction: validation record, XP credit, ledger entry,
//!    participant record, application acceptance
//! 3. Run post-commit effects: badge evaluation and notifications
//!
//! Post-commit effects are best-effort and idempotent; they never fail a
//! validation that has already committed.

use serde::Serialize;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType, BadgeTrigger};
use crate::services::badges::BadgeEngine;
use crate::services::notifications::{NotificationContent, NotificationService};
use crate::time_utils::{today_utc, within_window};

/// Successful validation result returned to the scanner UI.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSuccess {
    pub success: bool,
    pub xp_reward: u32,
    pub activity_title: String,
    /// Member XP after the credit
    pub member_xp: u64,
    pub level: u64,
    /// Badge ids granted as a side effect, if any
    pub badges_granted: Vec<String>,
}

/// Orchestrates QR validations end to end.
#[derive(Clone)]
pub struct ValidationEngine {
    db: FirestoreDb,
    badges: BadgeEngine,
    notifier: NotificationService,
}

impl ValidationEngine {
    pub fn new(db: FirestoreDb, badges: BadgeEngine, notifier: NotificationService) -> Self {
        Self {
            db,
            badges,
            notifier,
        }
    }

    /// Validate a member's participation in an activity via its QR token.
    ///
    /// Preconditions are evaluated in order and the first failure wins:
    /// unknown activity, token mismatch, date window (local and event
    /// activities only, by UTC calendar date), duplicate validation.
    pub async fn validate(
        &self,
        member_id: &str,
        activity_id: &str,
        qr_token: &str,
    ) -> Result<ValidationSuccess> {
        let activity = self
            .db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if activity.qr_code_token != qr_token {
            tracing::warn!(member_id, activity_id, "Validation with mismatched QR token");
            return Err(AppError::InvalidToken);
        }

        if date_gated(activity.activity_type)
            && !within_window(today_utc(), activity.start_date, activity.end_date)
        {
            return Err(AppError::OutOfWindow);
        }

        // Cheap early duplicate check; the transaction re-checks before
        // committing, so a lost race still cannot double-credit.
        if self
            .db
            .get_validation(activity_id, member_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyValidated);
        }

        let commit = self.db.record_validation_atomic(&activity, member_id).await?;

        let badges_granted = self.post_commit_effects(member_id, &activity, commit.xp_granted).await;

        Ok(ValidationSuccess {
            success: true,
            xp_reward: commit.xp_granted,
            activity_title: activity.title,
            member_xp: commit.member_xp_after,
            level: commit.member_xp_after / crate::models::member::XP_PER_LEVEL + 1,
            badges_granted,
        })
    }

    /// Badge evaluation and notifications, after the transaction committed.
    async fn post_commit_effects(
        &self,
        member_id: &str,
        activity: &Activity,
        xp_granted: u32,
    ) -> Vec<String> {
        let badges_granted = match self
            .badges
            .run_trigger(member_id, BadgeTrigger::OnValidation)
            .await
        {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(member_id, error = %e, "Badge evaluation after validation failed");
                Vec::new()
            }
        };

        self.notifier
            .dispatch_best_effort(
                member_id,
                NotificationContent::participation_confirmed(&activity.title, xp_granted),
            )
            .await;

        badges_granted
    }
}

/// Online activities can be validated any time; local and event
/// participation must fall inside the activity's date window.
fn date_gated(activity_type: ActivityType) -> bool {
    matches!(activity_type, ActivityType::Local | ActivityType::Event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_and_event_are_date_gated() {
        assert!(!date_gated(ActivityType::Online));
        assert!(date_gated(ActivityType::Local));
        assert!(date_gated(ActivityType::Event));
    }
}
