// SPDX-License-Identifier: MIT

//! Notification dispatch: preference-gated fan-out to in-app documents and
//! push delivery.
//!
//! Channel selection is per category: a member can independently disable
//! in-app and push delivery for gamification and activity notifications.
//! Push failures never propagate to the caller; permanently dead device
//! tokens are pruned from the member document.

use serde_json::json;
use uuid::Uuid;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    ChannelPreferences, Member, Notification, NotificationCategory, NotificationPreferences,
};
use crate::time_utils::format_utc_rfc3339;

/// Push delivery attempts before a token failure is treated as permanent.
const PUSH_MAX_ATTEMPTS: u32 = 3;

/// Base delay between push retries.
const PUSH_BACKOFF_BASE_MS: u64 = 200;

const PUSH_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Resolve the channel preferences that govern a category.
pub fn channels_for(
    prefs: &NotificationPreferences,
    category: NotificationCategory,
) -> &ChannelPreferences {
    match category {
        NotificationCategory::Gamification => &prefs.gamification,
        NotificationCategory::Activity => &prefs.activity,
    }
}

/// Outcome of a single push send.
#[derive(Debug)]
enum PushSendError {
    /// Worth retrying (network, 5xx, rate limit)
    Transient(String),
    /// The device token is dead; stop retrying and prune it
    DeadToken,
}

/// Client for the push delivery backend.
///
/// Without credentials the client runs disabled: sends are logged and
/// dropped, which is also the offline test mode.
#[derive(Clone)]
pub struct PushService {
    http: reqwest::Client,
    server_key: Option<String>,
}

impl PushService {
    pub fn new(server_key: &str) -> Self {
        let server_key = if server_key.is_empty() {
            tracing::warn!("Push service credentials missing, push delivery disabled");
            None
        } else {
            Some(server_key.to_string())
        };
        Self {
            http: reqwest::Client::new(),
            server_key,
        }
    }

    /// Disabled push client for tests.
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            server_key: None,
        }
    }

    /// Send one push message, retrying transient failures.
    ///
    /// Returns `Ok(false)` when the token turned out to be permanently dead.
    async fn send_with_retry(
        &self,
        token: &str,
        title: &str,
        body: &str,
        link: &str,
    ) -> Result<bool> {
        let Some(server_key) = &self.server_key else {
            tracing::debug!(title, "Push delivery disabled, dropping message");
            return Ok(true);
        };

        for attempt in 1..=PUSH_MAX_ATTEMPTS {
            match self.send_once(server_key, token, title, body, link).await {
                Ok(()) => return Ok(true),
                Err(PushSendError::DeadToken) => {
                    tracing::info!("Push token permanently rejected");
                    return Ok(false);
                }
                Err(PushSendError::Transient(msg)) => {
                    if attempt == PUSH_MAX_ATTEMPTS {
                        tracing::warn!(error = %msg, attempts = attempt, "Push delivery failed");
                        return Ok(true);
                    }
                    let delay = PUSH_BACKOFF_BASE_MS << (attempt - 1);
                    tracing::debug!(error = %msg, attempt, delay_ms = delay, "Push send failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
            }
        }
        Ok(true)
    }

    async fn send_once(
        &self,
        server_key: &str,
        token: &str,
        title: &str,
        body: &str,
        link: &str,
    ) -> std::result::Result<(), PushSendError> {
        let payload = json!({
            "to": token,
            "notification": { "title": title, "body": body },
            "data": { "link": link },
        });

        let response = self
            .http
            .post(PUSH_ENDPOINT)
            .header("Authorization", format!("key={}", server_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PushSendError::Transient(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            // The backend reports per-token errors in a 200 body.
            if text.contains("NotRegistered") || text.contains("InvalidRegistration") {
                return Err(PushSendError::DeadToken);
            }
            return Ok(());
        }

        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(PushSendError::DeadToken);
        }

        Err(PushSendError::Transient(format!("HTTP {}: {}", status, text)))
    }
}

/// Content of one notification before channel fan-out.
#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    /// Path appended to the app base URL
    pub link_path: String,
}

/// Preference-aware notification dispatcher.
#[derive(Clone)]
pub struct NotificationService {
    db: FirestoreDb,
    push: PushService,
    app_url: String,
}

impl NotificationService {
    pub fn new(db: FirestoreDb, push: PushService, app_url: &str) -> Self {
        Self {
            db,
            push,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    /// Deliver a notification to a member over every channel their
    /// preferences enable. Best-effort: delivery failures are logged, the
    /// triggering operation has already committed.
    pub async fn dispatch(&self, user_id: &str, content: NotificationContent) -> Result<()> {
        let Some(member) = self.db.get_member(user_id).await? else {
            tracing::warn!(user_id, "Dropping notification for unknown member");
            return Ok(());
        };

        let channels = channels_for(&member.notification_preferences, content.category);
        let link = format!("{}{}", self.app_url, content.link_path);

        if channels.in_app {
            let notification = Notification {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                category: content.category,
                title: content.title.clone(),
                body: content.body.clone(),
                link: link.clone(),
                created_at: format_utc_rfc3339(chrono::Utc::now()),
                read_at: None,
            };
            self.db.create_notification(&notification).await?;
        }

        if channels.push {
            self.push_to_member(&member, &content, &link).await;
        }

        Ok(())
    }

    /// Like [`dispatch`](Self::dispatch) but swallows every error.
    pub async fn dispatch_best_effort(&self, user_id: &str, content: NotificationContent) {
        if let Err(e) = self.dispatch(user_id, content).await {
            tracing::warn!(user_id, error = %e, "Notification dispatch failed");
        }
    }

    async fn push_to_member(&self, member: &Member, content: &NotificationContent, link: &str) {
        for token in &member.fcm_tokens {
            match self
                .push
                .send_with_retry(token, &content.title, &content.body, link)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.db.remove_fcm_token(&member.uid, token).await {
                        tracing::warn!(uid = %member.uid, error = %e, "Failed to prune dead push token");
                    }
                }
                Err(e) => {
                    tracing::warn!(uid = %member.uid, error = %e, "Push delivery error");
                }
            }
        }
    }

    /// Idempotent single mark-as-read.
    pub async fn mark_one(&self, notification_id: &str, user_id: &str) -> Result<()> {
        self.db.mark_notification_read(notification_id, user_id).await
    }

    /// Idempotent mark-all-as-read; returns how many were newly marked.
    pub async fn mark_all(&self, user_id: &str) -> Result<usize> {
        self.db.mark_all_notifications_read(user_id).await
    }

    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>> {
        self.db.list_notifications_for_user(user_id, limit).await
    }
}

// Convenience constructors for the notifications the engine emits.

impl NotificationContent {
    pub fn badge_earned(badge_name: &str, xp: u32) -> Self {
        Self {
            category: NotificationCategory::Gamification,
            title: format!("Badge earned: {}", badge_name),
            body: format!("You earned {} XP. Keep it up!", xp),
            link_path: "/profile?tab=badges".to_string(),
        }
    }

    pub fn participation_confirmed(activity_title: &str, xp: u32) -> Self {
        Self {
            category: NotificationCategory::Activity,
            title: "Participation confirmed".to_string(),
            body: format!("+{} XP for {}", xp, activity_title),
            link_path: "/profile?tab=history".to_string(),
        }
    }

    pub fn application_update(activity_title: &str, activity_id: &str, accepted: bool) -> Self {
        let outcome = if accepted { "accepted" } else { "declined" };
        Self {
            category: NotificationCategory::Activity,
            title: format!("Application {}", outcome),
            body: format!("Your application for {} was {}.", activity_title, outcome),
            link_path: format!("/activities/{}", urlencoding::encode(activity_id)),
        }
    }

    pub fn new_application(activity_title: &str, activity_id: &str) -> Self {
        Self {
            category: NotificationCategory::Activity,
            title: "New application".to_string(),
            body: format!("A volunteer applied to {}.", activity_title),
            link_path: format!("/manage/activities/{}", urlencoding::encode(activity_id)),
        }
    }

    pub fn activity_reminder(activity_title: &str, activity_id: &str, start_date: &str) -> Self {
        Self {
            category: NotificationCategory::Activity,
            title: format!("Reminder: {}", activity_title),
            body: format!("Your activity starts on {}.", start_date),
            link_path: format!("/activities/{}", urlencoding::encode(activity_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(g_in: bool, g_push: bool, a_in: bool, a_push: bool) -> NotificationPreferences {
        NotificationPreferences {
            gamification: ChannelPreferences {
                in_app: g_in,
                push: g_push,
            },
            activity: ChannelPreferences {
                in_app: a_in,
                push: a_push,
            },
        }
    }

    #[test]
    fn channel_selection_follows_category() {
        let p = prefs(true, false, false, true);

        let gamification = channels_for(&p, NotificationCategory::Gamification);
        assert!(gamification.in_app);
        assert!(!gamification.push);

        let activity = channels_for(&p, NotificationCategory::Activity);
        assert!(!activity.in_app);
        assert!(activity.push);
    }

    #[test]
    fn content_constructors_pick_categories() {
        assert_eq!(
            NotificationContent::badge_earned("First Steps", 10).category,
            NotificationCategory::Gamification
        );
        assert_eq!(
            NotificationContent::new_application("Cleanup", "a1").category,
            NotificationCategory::Activity
        );
    }

    #[test]
    fn links_are_url_encoded() {
        let content = NotificationContent::application_update("T", "id with spaces", true);
        assert!(content.link_path.contains("id%20with%20spaces"));
    }

    #[tokio::test]
    async fn disabled_push_drops_silently() {
        let push = PushService::new_mock();
        let delivered = push
            .send_with_retry("token", "title", "body", "https://example.com")
            .await
            .unwrap();
        assert!(delivered);
    }
}
