// SPDX-License-Identifier: MIT

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks and Cloud Scheduler, not
//! directly by users. OIDC verification is applied in routes/mod.rs.

use crate::models::ActivityStatus;
use crate::services::notifications::NotificationContent;
use crate::services::tasks::SendReminderPayload;
use crate::time_utils::today_utc;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use chrono::Days;
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks / Cloud Scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/dispatch-reminders", post(dispatch_reminders))
        .route("/tasks/send-reminder", post(send_reminder))
}

/// Daily sweep: queue one reminder task per open activity starting
/// tomorrow. Triggered by Cloud Scheduler.
async fn dispatch_reminders(State(state): State<Arc<AppState>>) -> StatusCode {
    let Some(tomorrow) = today_utc().checked_add_days(Days::new(1)) else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let activities = match state.db.list_activities_starting_on(tomorrow).await {
        Ok(activities) => activities,
        Err(e) => {
            tracing::error!(error = %e, "Reminder sweep query failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let payloads: Vec<SendReminderPayload> = activities
        .into_iter()
        .filter(|a| a.status == ActivityStatus::Open)
        .map(|a| SendReminderPayload {
            activity_id: a.id,
            occurrence_start: a.start_date.format("%Y-%m-%d").to_string(),
        })
        .collect();

    if payloads.is_empty() {
        tracing::debug!(date = %tomorrow, "No activities to remind");
        return StatusCode::OK;
    }

    let result = state
        .tasks
        .queue_reminders(&state.config.api_url, payloads)
        .await;

    tracing::info!(
        date = %tomorrow,
        queued = result.queued,
        failed = result.failed,
        "Reminder sweep complete"
    );

    // Failures are retried by the next sweep; the scheduler call succeeded.
    StatusCode::OK
}

/// Send reminders to every accepted applicant of one activity.
async fn send_reminder(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendReminderPayload>,
) -> StatusCode {
    let activity = match state.db.get_activity(&payload.activity_id).await {
        Ok(Some(activity)) => activity,
        Ok(None) => {
            tracing::warn!(activity_id = %payload.activity_id, "Reminder for missing activity");
            // Do not retry: the activity was deleted after queueing.
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(activity_id = %payload.activity_id, error = %e, "Reminder lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let member_ids = match state.db.list_accepted_member_ids(&activity.id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(activity_id = %activity.id, error = %e, "Accepted applicant query failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    for member_id in &member_ids {
        state
            .notifier
            .dispatch_best_effort(
                member_id,
                NotificationContent::activity_reminder(
                    &activity.title,
                    &activity.id,
                    &payload.occurrence_start,
                ),
            )
            .await;
    }

    tracing::info!(
        activity_id = %activity.id,
        recipients = member_ids.len(),
        "Activity reminders sent"
    );
    StatusCode::OK
}
