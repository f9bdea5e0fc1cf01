// SPDX-License-Identifier: MIT

//! In-app notification documents.

use serde::{Deserialize, Serialize};

/// Notification classes; each maps to a preference entry with two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    /// Badge earned, XP milestones, referral rewards
    Gamification,
    /// Application status changes, reminders, new applications for NPOs
    Activity,
}

/// Notification document, keyed by UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    /// Deep link into the app
    pub link: String,
    pub created_at: String,
    /// Set at most once by mark-as-read
    pub read_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&NotificationCategory::Gamification).unwrap(),
            "\"GAMIFICATION\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationCategory::Activity).unwrap(),
            "\"ACTIVITY\""
        );
    }
}
