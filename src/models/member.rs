// SPDX-License-Identifier: MIT

//! Member model: profile, XP, badges and notification preferences.

use serde::{Deserialize, Serialize};

/// XP needed per level. `level = xp / 100 + 1`.
pub const XP_PER_LEVEL: u64 = 100;

/// Member profile stored in Firestore, keyed by auth uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Auth provider uid (also used as document ID)
    pub uid: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub bio: String,
    /// The cause the member cares about most
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub hobbies: String,
    #[serde(default)]
    pub country: String,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Weekly time commitment flags (e.g. "1-2h", "3-5h")
    #[serde(default)]
    pub time_commitment: Vec<String>,
    /// Availability flags (e.g. "weekends", "evenings")
    #[serde(default)]
    pub availability: Vec<String>,

    /// Lifetime experience points; only ever incremented by the engine
    #[serde(default)]
    pub xp: u64,
    /// Badge IDs held (set semantics, no duplicates)
    #[serde(default)]
    pub badges: Vec<String>,
    /// 5-char referral code, unique across members
    pub code: String,
    /// Referral code of the member who invited this one
    pub referred_by: Option<String>,

    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    /// Push delivery tokens for this member's devices
    #[serde(default)]
    pub fcm_tokens: Vec<String>,

    /// When member first logged in (ISO 8601)
    pub created_at: String,
    /// Last activity timestamp
    pub last_active: String,
}

impl Member {
    /// Current level derived from XP.
    pub fn level(&self) -> u64 {
        self.xp / XP_PER_LEVEL + 1
    }

    /// Whether the badge is already held.
    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b == badge_id)
    }

    /// Completeness predicate for the complete-profile badge: every core
    /// profile field filled, plus at least one language, one time-commitment
    /// flag and one availability flag.
    pub fn profile_complete(&self) -> bool {
        !self.display_name.is_empty()
            && !self.bio.is_empty()
            && !self.cause.is_empty()
            && !self.hobbies.is_empty()
            && !self.country.is_empty()
            && self.profile_picture.as_deref().is_some_and(|p| !p.is_empty())
            && !self.languages.is_empty()
            && !self.time_commitment.is_empty()
            && !self.availability.is_empty()
    }
}

/// Per-category notification channel preferences.
///
/// Two categories × two channels of boolean; everything defaults to on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "ChannelPreferences::default_on")]
    pub gamification: ChannelPreferences,
    #[serde(default = "ChannelPreferences::default_on")]
    pub activity: ChannelPreferences,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            gamification: ChannelPreferences::default_on(),
            activity: ChannelPreferences::default_on(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreferences {
    #[serde(default = "default_true")]
    pub in_app: bool,
    #[serde(default = "default_true")]
    pub push: bool,
}

impl ChannelPreferences {
    fn default_on() -> Self {
        Self {
            in_app: true,
            push: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_member() -> Member {
        Member {
            uid: "u1".to_string(),
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
            xp: 0,
            badges: vec![],
            code: "ADA1X".to_string(),
            referred_by: None,
            notification_preferences: NotificationPreferences::default(),
            fcm_tokens: vec![],
            created_at: "2025-01-01T00:00:00Z".to_string(),
            last_active: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn level_boundaries() {
        let mut m = test_member();
        assert_eq!(m.level(), 1);
        m.xp = 99;
        assert_eq!(m.level(), 1);
        m.xp = 100;
        assert_eq!(m.level(), 2);
        m.xp = 163;
        assert_eq!(m.level(), 2);
        m.xp = 200;
        assert_eq!(m.level(), 3);
    }

    #[test]
    fn profile_complete_requires_every_field() {
        let complete = test_member();
        assert!(complete.profile_complete());

        let mut missing_bio = test_member();
        missing_bio.bio.clear();
        assert!(!missing_bio.profile_complete());

        let mut no_languages = test_member();
        no_languages.languages.clear();
        assert!(!no_languages.profile_complete());

        let mut empty_picture = test_member();
        empty_picture.profile_picture = Some(String::new());
        assert!(!empty_picture.profile_complete());
    }

    #[test]
    fn preferences_default_everything_on() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.gamification.in_app);
        assert!(prefs.gamification.push);
        assert!(prefs.activity.in_app);
        assert!(prefs.activity.push);
    }

    #[test]
    fn preferences_missing_fields_deserialize_on() {
        let prefs: NotificationPreferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, NotificationPreferences::default());
    }

    proptest! {
        #[test]
        fn preferences_roundtrip(g_in in any::<bool>(), g_push in any::<bool>(),
                                 a_in in any::<bool>(), a_push in any::<bool>()) {
            let prefs = NotificationPreferences {
                gamification: ChannelPreferences { in_app: g_in, push: g_push },
                activity: ChannelPreferences { in_app: a_in, push: a_push },
            };
            let json = serde_json::to_string(&prefs).unwrap();
            let back: NotificationPreferences = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, prefs);
        }
    }
}
