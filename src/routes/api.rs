// SPDX-License-Identifier: MIT

//! API routes for authenticated members: profile, ledger, notifications,
//! idea box and FAQ.

use crate::error::{AppError, Result};
use crate::locale::Locale;
use crate::middleware::auth::AuthUser;
use crate::models::badge::BadgeTrigger;
use crate::models::{Member, NotificationPreferences};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const NOTIFICATION_LIST_LIMIT: u32 = 100;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", put(save_profile))
        .route("/api/xp-history", get(get_xp_history))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/ideas", post(submit_idea))
}

// ─── Member Profile ──────────────────────────────────────────

#[derive(Deserialize)]
struct MeQuery {
    /// Referral code supplied at signup
    #[serde(rename = "ref")]
    referral: Option<String>,
}

/// Current member response.
#[derive(Serialize)]
pub struct MemberResponse {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub xp: u64,
    pub level: u64,
    pub badges: Vec<String>,
    pub code: String,
    pub referred_by: Option<String>,
    pub notification_preferences: NotificationPreferences,
    /// True when this request created the member (first login)
    pub created: bool,
}

impl MemberResponse {
    fn from_member(member: Member, created: bool) -> Self {
        let level = member.level();
        Self {
            uid: member.uid,
            display_name: member.display_name,
            email: member.email,
            xp: member.xp,
            level,
            badges: member.badges,
            code: member.code,
            referred_by: member.referred_by,
            notification_preferences: member.notification_preferences,
            created,
        }
    }
}

/// Get the current member, creating the document on first login.
///
/// First login allocates a unique referral code, applies an optional `ref`
/// code, and runs the signup badge triggers for both sides of the referral.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MeQuery>,
) -> Result<Json<MemberResponse>> {
    if let Some(member) = state.db.get_member(&user.uid).await? {
        return Ok(Json(MemberResponse::from_member(member, false)));
    }

    let email = user.email.clone().unwrap_or_default();
    let display_name = user
        .name
        .clone()
        .unwrap_or_else(|| "Volunteer".to_string());

    let code = state
        .referral
        .allocate_code(&user.uid, &email, &display_name)
        .await?;

    let referred_by = match query.referral {
        Some(referral) if state.referral.validate_code(&referral).await? => Some(referral),
        Some(referral) => {
            tracing::debug!(uid = %user.uid, referral, "Ignoring unknown referral code");
            None
        }
        None => None,
    };

    let now = format_utc_rfc3339(chrono::Utc::now());
    let member = Member {
        uid: user.uid.clone(),
        display_name,
        email,
        bio: String::new(),
        cause: String::new(),
        hobbies: String::new(),
        country: String::new(),
        profile_picture: None,
        languages: vec![],
        time_commitment: vec![],
        availability: vec![],
        xp: 0,
        badges: vec![],
        code,
        referred_by: referred_by.clone(),
        notification_preferences: NotificationPreferences::default(),
        fcm_tokens: vec![],
        created_at: now.clone(),
        last_active: now,
    };
    state.db.upsert_member(&member).await?;
    tracing::info!(uid = %user.uid, "Member created on first login");

    // Signup badges for the new member and, where present, the referrer.
    if let Err(e) = state
        .badges
        .run_trigger(&user.uid, BadgeTrigger::OnSignup)
        .await
    {
        tracing::warn!(uid = %user.uid, error = %e, "Signup badge evaluation failed");
    }
    if let Some(referral) = &referred_by {
        match state.db.find_member_by_code(referral).await {
            Ok(Some(referrer)) => {
                if let Err(e) = state
                    .badges
                    .run_trigger(&referrer.uid, BadgeTrigger::OnSignup)
                    .await
                {
                    tracing::warn!(uid = %referrer.uid, error = %e, "Referrer badge evaluation failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Referrer lookup failed"),
        }
    }

    let member = state
        .db
        .get_member(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", user.uid)))?;
    Ok(Json(MemberResponse::from_member(member, true)))
}

// ─── Profile Save ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100))]
    display_name: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    bio: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    cause: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    hobbies: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    country: String,
    profile_picture: Option<String>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    time_commitment: Vec<String>,
    #[serde(default)]
    availability: Vec<String>,
    notification_preferences: Option<NotificationPreferences>,
    /// Push token of the current device, added to the member's set
    fcm_token: Option<String>,
}

#[derive(Serialize)]
struct ProfileUpdateResponse {
    #[serde(flatten)]
    member: MemberResponse,
    /// Badges granted by this save (e.g. profile completion)
    badges_granted: Vec<String>,
}

/// Save the member's profile and run the profile-save badge trigger.
async fn save_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileUpdateResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut member = state
        .db
        .get_member(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", user.uid)))?;

    member.display_name = payload.display_name;
    member.bio = payload.bio;
    member.cause = payload.cause;
    member.hobbies = payload.hobbies;
    member.country = payload.country;
    member.profile_picture = payload.profile_picture;
    member.languages = payload.languages;
    member.time_commitment = payload.time_commitment;
    member.availability = payload.availability;
    if let Some(prefs) = payload.notification_preferences {
        member.notification_preferences = prefs;
    }
    if let Some(token) = payload.fcm_token {
        if !token.is_empty() && !member.fcm_tokens.contains(&token) {
            member.fcm_tokens.push(token);
        }
    }
    member.last_active = format_utc_rfc3339(chrono::Utc::now());

    state.db.upsert_member(&member).await?;

    let badges_granted = match state
        .badges
        .run_trigger(&user.uid, BadgeTrigger::OnProfileSave)
        .await
    {
        Ok(granted) => granted,
        Err(e) => {
            tracing::warn!(uid = %user.uid, error = %e, "Profile badge evaluation failed");
            Vec::new()
        }
    };

    let member = state
        .db
        .get_member(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", user.uid)))?;

    Ok(Json(ProfileUpdateResponse {
        member: MemberResponse::from_member(member, false),
        badges_granted,
    }))
}

// ─── XP History ──────────────────────────────────────────────

#[derive(Deserialize)]
struct XpHistoryQuery {
    cursor: Option<String>,
    per_page: Option<u32>,
}

#[derive(Serialize)]
struct XpHistoryResponse {
    entries: Vec<crate::models::XpHistoryEntry>,
    next_cursor: Option<String>,
}

/// Paginated XP ledger, newest first.
async fn get_xp_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<XpHistoryQuery>,
) -> Result<Json<XpHistoryResponse>> {
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let page = state
        .db
        .get_xp_history(&user.uid, query.cursor.as_deref(), per_page)
        .await?;

    Ok(Json(XpHistoryResponse {
        entries: page.entries,
        next_cursor: page.next_cursor,
    }))
}

// ─── Notifications ───────────────────────────────────────────

#[derive(Serialize)]
struct NotificationsResponse {
    notifications: Vec<crate::models::Notification>,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationsResponse>> {
    let notifications = state
        .notifier
        .list_for_user(&user.uid, NOTIFICATION_LIST_LIMIT)
        .await?;
    Ok(Json(NotificationsResponse { notifications }))
}

#[derive(Serialize)]
struct MarkReadResponse {
    success: bool,
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>> {
    state.notifier.mark_one(&id, &user.uid).await?;
    Ok(Json(MarkReadResponse { success: true }))
}

#[derive(Serialize)]
struct MarkAllReadResponse {
    success: bool,
    marked: usize,
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MarkAllReadResponse>> {
    let marked = state.notifier.mark_all(&user.uid).await?;
    Ok(Json(MarkAllReadResponse {
        success: true,
        marked,
    }))
}

// ─── Idea Box ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct IdeaRequest {
    #[validate(length(min = 1, max = 2000))]
    text: String,
}

#[derive(Serialize)]
struct IdeaResponse {
    id: String,
}

/// Write-once feedback entry.
async fn submit_idea(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
    Json(payload): Json<IdeaRequest>,
) -> Result<Json<IdeaResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let idea = crate::models::IdeaEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user.uid.clone(),
        text: payload.text,
        locale: Locale::from_cookies(&jar).as_str().to_string(),
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    };
    state.db.create_idea(&idea).await?;
    Ok(Json(IdeaResponse { id: idea.id }))
}

// ─── FAQ (public) ────────────────────────────────────────────

#[derive(Serialize)]
pub struct FaqItem {
    id: String,
    question: String,
    answer: String,
}

#[derive(Serialize)]
pub struct FaqResponse {
    locale: &'static str,
    items: Vec<FaqItem>,
}

/// FAQ entries localized via the `NEXT_LOCALE` cookie.
pub async fn get_faq(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<FaqResponse>> {
    let locale = Locale::from_cookies(&jar);
    let items = state
        .db
        .list_faq()
        .await?
        .into_iter()
        .map(|entry| FaqItem {
            id: entry.id,
            question: entry.question.get(locale).to_string(),
            answer: entry.answer.get(locale).to_string(),
        })
        .collect();
    Ok(Json(FaqResponse {
        locale: locale.as_str(),
        items,
    }))
}
