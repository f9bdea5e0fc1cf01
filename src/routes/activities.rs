// SPDX-License-Identifier: MIT

//! Activity routes: QR validation, activity lifecycle and applications.

use crate::error::{AppError, Result};
use crate::locale::{validation_message, Locale};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityStatus, ActivityType, ApplicationStatus, Frequency};
use crate::services::recurrence::{Cadence, RecurrenceEnd, RecurrenceRule};
use crate::services::NewActivity;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities/{id}/validate", post(validate_activity))
        .route(
            "/api/organizations/{org_id}/activities",
            get(list_org_activities).post(create_activity),
        )
        .route("/api/activities/{id}/status", patch(transition_status))
        .route("/api/activities/{id}", delete(delete_activity))
        .route("/api/activities/{id}/applications", post(apply))
        .route(
            "/api/activities/{id}/applications/{member_id}",
            patch(decide_application),
        )
}

// ─── QR Validation ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct ValidateRequest {
    #[validate(length(min = 1, max = 128))]
    qr_token: String,
}

#[derive(Serialize)]
struct ValidationErrorBody {
    success: bool,
    error: &'static str,
    message: &'static str,
    retryable: bool,
}

/// Validate participation by QR token.
///
/// Failures carry a message localized via the `NEXT_LOCALE` cookie so the
/// scanner UI can show them directly.
async fn validate_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
    Path(activity_id): Path<String>,
    Json(payload): Json<ValidateRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return AppError::BadRequest(e.to_string()).into_response();
    }

    match state
        .validation
        .validate(&user.uid, &activity_id, &payload.qr_token)
        .await
    {
        Ok(success) => Json(success).into_response(),
        Err(err) => {
            let locale = Locale::from_cookies(&jar);
            let kind = err.kind();
            let status = err.into_response().status();
            let body = ValidationErrorBody {
                success: false,
                error: kind,
                message: validation_message(kind, locale),
                retryable: kind == "transient",
            };
            (status, Json(body)).into_response()
        }
    }
}

// ─── Activity Lifecycle ──────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateActivityRequest {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[serde(rename = "type")]
    activity_type: ActivityType,
    #[validate(length(min = 1, max = 64))]
    category: String,
    frequency: Frequency,
    time_commitment: Option<f64>,
    complexity: Option<f64>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: ActivityStatus,
    #[serde(default)]
    accept_applications_wg: bool,
    recurrence: Option<RecurrenceRequest>,
}

/// Recurrence descriptor as sent by the activity form. The cadence arrives
/// as a free-form string so unknown values surface a clear error.
#[derive(Deserialize)]
struct RecurrenceRequest {
    cadence: String,
    #[serde(default)]
    recurrence_days: Vec<u8>,
    end_type: String,
    occurrences: Option<u32>,
    end_date: Option<NaiveDate>,
}

impl RecurrenceRequest {
    fn into_rule(self) -> Result<RecurrenceRule> {
        let cadence = Cadence::parse(&self.cadence).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let end = match self.end_type.as_str() {
            "occurrences" => RecurrenceEnd::Occurrences {
                occurrences: self.occurrences.ok_or_else(|| {
                    AppError::BadRequest("occurrences is required for end_type=occurrences".into())
                })?,
            },
            "date" => RecurrenceEnd::Date {
                end_date: self.end_date.ok_or_else(|| {
                    AppError::BadRequest("end_date is required for end_type=date".into())
                })?,
            },
            other => {
                return Err(AppError::BadRequest(format!("unknown end_type: {}", other)));
            }
        };
        Ok(RecurrenceRule {
            cadence,
            recurrence_days: self.recurrence_days,
            end,
        })
    }
}

#[derive(Serialize)]
struct CreateActivityResponse {
    activities: Vec<crate::models::Activity>,
    series_id: Option<String>,
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(org_id): Path<String>,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<Json<CreateActivityResponse>> {
    if !user.manages_org(&org_id) {
        return Err(AppError::Permission(
            "caller does not manage this organization".to_string(),
        ));
    }
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let recurrence = payload
        .recurrence
        .map(RecurrenceRequest::into_rule)
        .transpose()?;

    let activities = state
        .activities
        .create(NewActivity {
            org_id,
            title: payload.title,
            activity_type: payload.activity_type,
            category: payload.category,
            frequency: payload.frequency,
            time_commitment: payload.time_commitment,
            complexity: payload.complexity,
            start_date: payload.start_date,
            end_date: payload.end_date,
            status: payload.status,
            accept_applications_wg: payload.accept_applications_wg,
            recurrence,
        })
        .await?;

    let series_id = activities.first().and_then(|a| a.series_id.clone());
    Ok(Json(CreateActivityResponse {
        activities,
        series_id,
    }))
}

const ORG_ACTIVITY_LIST_LIMIT: u32 = 100;

#[derive(Serialize)]
struct OrgActivitiesResponse {
    activities: Vec<crate::models::Activity>,
}

/// Activities of one organization, newest first (NPO dashboard).
async fn list_org_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(org_id): Path<String>,
) -> Result<Json<OrgActivitiesResponse>> {
    if !user.manages_org(&org_id) {
        return Err(AppError::Permission(
            "caller does not manage this organization".to_string(),
        ));
    }
    let activities = state
        .db
        .list_activities_for_org(&org_id, ORG_ACTIVITY_LIST_LIMIT)
        .await?;
    Ok(Json(OrgActivitiesResponse { activities }))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: ActivityStatus,
}

async fn transition_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<crate::models::Activity>> {
    require_activity_manager(&state, &user, &activity_id).await?;
    let activity = state
        .activities
        .transition_status(&activity_id, payload.status)
        .await?;
    Ok(Json(activity))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    require_activity_manager(&state, &user, &activity_id).await?;
    state.activities.delete_draft(&activity_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

// ─── Applications ────────────────────────────────────────────

async fn apply(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
) -> Result<Json<crate::models::Application>> {
    let application = state.activities.apply(&activity_id, &user.uid).await?;
    Ok(Json(application))
}

#[derive(Deserialize)]
struct ApplicationDecisionRequest {
    status: ApplicationStatus,
}

/// Accept/reject by the NPO manager, or cancel by the applicant themself.
async fn decide_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((activity_id, member_id)): Path<(String, String)>,
    Json(payload): Json<ApplicationDecisionRequest>,
) -> Result<Json<crate::models::Application>> {
    match payload.status {
        ApplicationStatus::Cancelled => {
            if user.uid != member_id {
                return Err(AppError::Permission(
                    "only the applicant can cancel".to_string(),
                ));
            }
        }
        ApplicationStatus::Accepted | ApplicationStatus::Rejected => {
            require_activity_manager(&state, &user, &activity_id).await?;
        }
        ApplicationStatus::Pending => {
            return Err(AppError::BadRequest(
                "applications cannot return to pending".to_string(),
            ));
        }
    }

    let application = state
        .activities
        .set_application_status(&activity_id, &member_id, payload.status)
        .await?;
    Ok(Json(application))
}

/// Load the activity and require a manager claim for its organization.
async fn require_activity_manager(
    state: &AppState,
    user: &AuthUser,
    activity_id: &str,
) -> Result<()> {
    let activity = state
        .db
        .get_activity(activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;
    if !user.manages_org(&activity.org_id) {
        return Err(AppError::Permission(
            "caller does not manage this organization".to_string(),
        ));
    }
    Ok(())
}
