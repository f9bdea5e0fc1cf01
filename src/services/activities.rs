// SPDX-License-Identifier: MIT

//! Activity lifecycle and application handling.
//!
//! Creating an activity computes its XP reward, mints a QR token, and, for
//! recurring activities, expands the recurrence into one activity document
//! per occurrence sharing a series id. Organization counters are maintained
//! in the same transaction as the documents they count.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    Activity, ActivityStatus, ActivityType, Application, ApplicationStatus, Frequency,
};
use crate::services::notifications::{NotificationContent, NotificationService};
use crate::services::recurrence::{self, RecurrenceRule};
use crate::services::xp;
use crate::time_utils::format_utc_rfc3339;

/// Input for creating an activity (or a recurring series).
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub org_id: String,
    pub title: String,
    pub activity_type: ActivityType,
    pub category: String,
    pub frequency: Frequency,
    pub time_commitment: Option<f64>,
    pub complexity: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Draft or Open; anything else is rejected
    pub status: ActivityStatus,
    pub accept_applications_wg: bool,
    pub recurrence: Option<RecurrenceRule>,
}

/// Activity and application operations.
#[derive(Clone)]
pub struct ActivityService {
    db: FirestoreDb,
    notifier: NotificationService,
}

impl ActivityService {
    pub fn new(db: FirestoreDb, notifier: NotificationService) -> Self {
        Self { db, notifier }
    }

    /// Create an activity, expanding a recurrence rule into one document
    /// per occurrence. Returns the created activities in series order.
    pub async fn create(&self, input: NewActivity) -> Result<Vec<Activity>> {
        if input.end_date < input.start_date {
            return Err(AppError::BadRequest(
                "end date must not precede start date".to_string(),
            ));
        }
        if input.status == ActivityStatus::Closed {
            return Err(AppError::BadRequest(
                "activities cannot be created closed".to_string(),
            ));
        }

        let xp_reward = xp::xp_of(
            input.activity_type,
            &input.category,
            input.time_commitment,
            input.complexity,
            input.frequency,
        );
        let now = format_utc_rfc3339(chrono::Utc::now());

        let activities = match &input.recurrence {
            None => vec![build_activity(&input, xp_reward, &now)],
            Some(rule) => {
                let series = recurrence::expand(input.start_date, input.end_date, rule)
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                series
                    .occurrences
                    .iter()
                    .map(|occ| {
                        let mut activity = build_activity(&input, xp_reward, &now);
                        activity.start_date = occ.start;
                        activity.end_date = occ.end;
                        activity.series_id = Some(series.series_id.clone());
                        activity.series_index = Some(occ.series_index);
                        activity.is_recurring = true;
                        activity
                    })
                    .collect()
            }
        };

        self.db.create_activities_atomic(&activities).await?;

        tracing::info!(
            org_id = %input.org_id,
            count = activities.len(),
            xp_reward,
            "Activities created"
        );
        Ok(activities)
    }

    /// Draft → Open → Closed transitions only.
    pub async fn transition_status(
        &self,
        activity_id: &str,
        new_status: ActivityStatus,
    ) -> Result<Activity> {
        let mut activity = self
            .db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if !activity.status.can_transition_to(new_status) {
            return Err(AppError::Precondition(format!(
                "cannot transition {:?} to {:?}",
                activity.status, new_status
            )));
        }

        activity.status = new_status;
        self.db.set_activity(&activity).await?;
        tracing::info!(activity_id, status = ?new_status, "Activity status changed");
        Ok(activity)
    }

    /// Delete an activity; only allowed while it is still a draft.
    pub async fn delete_draft(&self, activity_id: &str) -> Result<()> {
        self.db.delete_draft_activity_atomic(activity_id).await
    }

    /// Apply to an activity. At most one non-cancelled application per
    /// (member, activity); walk-in activities auto-accept.
    pub async fn apply(&self, activity_id: &str, member_id: &str) -> Result<Application> {
        let activity = self
            .db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if activity.status != ActivityStatus::Open {
            return Err(AppError::Precondition(
                "activity is not open for applications".to_string(),
            ));
        }

        let now = format_utc_rfc3339(chrono::Utc::now());
        let status = if activity.accept_applications_wg {
            ApplicationStatus::Accepted
        } else {
            ApplicationStatus::Pending
        };

        let application = Application {
            activity_id: activity.id.clone(),
            member_id: member_id.to_string(),
            org_id: activity.org_id.clone(),
            status,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.create_application_atomic(&application).await?;

        // Tell the NPO; tell the member immediately on auto-accept.
        if let Some(org) = self.db.get_organization(&activity.org_id).await? {
            self.notifier
                .dispatch_best_effort(
                    &org.owner_uid,
                    NotificationContent::new_application(&activity.title, &activity.id),
                )
                .await;
        }
        if status == ApplicationStatus::Accepted {
            self.notifier
                .dispatch_best_effort(
                    member_id,
                    NotificationContent::application_update(&activity.title, &activity.id, true),
                )
                .await;
        }

        Ok(application)
    }

    /// NPO decision on an application, or a member cancelling their own.
    pub async fn set_application_status(
        &self,
        activity_id: &str,
        member_id: &str,
        new_status: ApplicationStatus,
    ) -> Result<Application> {
        if new_status == ApplicationStatus::Pending {
            return Err(AppError::BadRequest(
                "applications cannot return to pending".to_string(),
            ));
        }

        let application = self
            .db
            .transition_application_atomic(activity_id, member_id, new_status)
            .await?;

        if matches!(
            new_status,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected
        ) {
            let title = self
                .db
                .get_activity(activity_id)
                .await?
                .map(|a| a.title)
                .unwrap_or_else(|| "an activity".to_string());
            self.notifier
                .dispatch_best_effort(
                    member_id,
                    NotificationContent::application_update(
                        &title,
                        activity_id,
                        new_status == ApplicationStatus::Accepted,
                    ),
                )
                .await;
        }

        Ok(application)
    }
}

fn build_activity(input: &NewActivity, xp_reward: u32, now: &str) -> Activity {
    Activity {
        id: Uuid::new_v4().to_string(),
        org_id: input.org_id.clone(),
        title: input.title.clone(),
        activity_type: input.activity_type,
        category: input.category.clone(),
        frequency: input.frequency,
        time_commitment: input.time_commitment,
        complexity: input.complexity,
        start_date: input.start_date,
        end_date: input.end_date,
        status: input.status,
        xp_reward,
        applicants: 0,
        qr_code_token: mint_qr_token(),
        accept_applications_wg: input.accept_applications_wg,
        series_id: None,
        series_index: None,
        is_recurring: false,
        created_at: now.to_string(),
    }
}

/// Opaque per-activity QR token.
fn mint_qr_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
