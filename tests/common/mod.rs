// SPDX-License-Identifier: MIT

use chrono::{Days, NaiveDate};
use voluntree::config::Config;
use voluntree::db::FirestoreDb;
use voluntree::models::{
    Activity, ActivityStatus, ActivityType, Frequency, Member, NotificationPreferences,
    Organization,
};
use voluntree::routes::create_router;
use voluntree::services::{
    ActivityService, BadgeEngine, NotificationService, OidcVerifier, PushService, ReferralService,
    TasksService, ValidationEngine,
};
use voluntree::time_utils::format_utc_rfc3339;
use voluntree::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Wire the engine services around a database handle.
#[allow(dead_code)]
pub fn build_services(
    db: FirestoreDb,
    config: &Config,
) -> (
    NotificationService,
    BadgeEngine,
    ValidationEngine,
    ActivityService,
    ReferralService,
) {
    let notifier = NotificationService::new(db.clone(), PushService::new_mock(), &config.app_url);
    let badges = BadgeEngine::new(db.clone(), notifier.clone());
    let validation = ValidationEngine::new(db.clone(), badges.clone(), notifier.clone());
    let activities = ActivityService::new(db.clone(), notifier.clone());
    let referral = ReferralService::new(db);
    (notifier, badges, validation, activities, referral)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    create_app_with_db(db, config)
}

/// Create a test app against a specific database (emulator or mock).
#[allow(dead_code)]
pub fn create_app_with_db(db: FirestoreDb, config: Config) -> (axum::Router, Arc<AppState>) {
    let tasks = TasksService::new(&config.gcp_project_id, &config.gcp_region);
    let (notifier, badges, validation, activities, referral) = build_services(db.clone(), &config);
    let oidc_verifier = Arc::new(OidcVerifier::new(&config).expect("OIDC verifier"));

    let state = Arc::new(AppState {
        config,
        db,
        tasks,
        notifier,
        badges,
        validation,
        activities,
        referral,
        oidc_verifier,
    });

    (create_router(state.clone()), state)
}

/// Session JWT for a plain member.
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str, signing_key: &[u8]) -> String {
    voluntree::middleware::auth::create_jwt(uid, signing_key).expect("JWT creation")
}

/// Session JWT carrying an org manager claim.
#[allow(dead_code)]
pub fn create_org_jwt(uid: &str, org_id: &str, signing_key: &[u8]) -> String {
    voluntree::middleware::auth::create_scoped_jwt(uid, None, None, false, Some(org_id), signing_key)
        .expect("JWT creation")
}

/// Generate a unique suffix for test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

/// Member fixture with a complete profile.
#[allow(dead_code)]
pub fn test_member(uid: &str, code: &str) -> Member {
    let now = format_utc_rfc3339(chrono::Utc::now());
    Member {
        uid: uid.to_string(),
        display_name: "Test Volunteer".to_string(),
        email: format!("{uid}@example.com"),
        bio: "Here to help".to_string(),
        cause: "environment".to_string(),
        hobbies: "hiking".to_string(),
        country: "FR".to_string(),
        profile_picture: Some("https://example.com/p.jpg".to_string()),
        languages: vec!["en".to_string()],
        time_commitment: vec!["1-2h".to_string()],
        availability: vec!["weekends".to_string()],
        xp: 0,
        badges: vec![],
        code: code.to_string(),
        referred_by: None,
        notification_preferences: NotificationPreferences::default(),
        fcm_tokens: vec![],
        created_at: now.clone(),
        last_active: now,
    }
}

/// Organization fixture with zeroed counters.
#[allow(dead_code)]
pub fn test_org(org_id: &str) -> Organization {
    Organization {
        org_id: org_id.to_string(),
        name: "Test NPO".to_string(),
        description: String::new(),
        owner_uid: format!("{org_id}-owner"),
        total_online_activities: 0,
        total_local_activities: 0,
        total_events: 0,
        total_participants: 0,
        total_new_applications: 0,
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    }
}

/// Open online activity fixture with a known token and reward.
#[allow(dead_code)]
pub fn test_activity(id: &str, org_id: &str, xp_reward: u32) -> Activity {
    let today = chrono::Utc::now().date_naive();
    test_activity_with_window(id, org_id, xp_reward, today, today)
}

#[allow(dead_code)]
pub fn test_activity_with_window(
    id: &str,
    org_id: &str,
    xp_reward: u32,
    start: NaiveDate,
    end: NaiveDate,
) -> Activity {
    Activity {
        id: id.to_string(),
        org_id: org_id.to_string(),
        title: "Consulting sprint".to_string(),
        activity_type: ActivityType::Online,
        category: "consulting".to_string(),
        frequency: Frequency::Once,
        time_commitment: Some(70.0),
        complexity: Some(75.0),
        start_date: start,
        end_date: end,
        status: ActivityStatus::Open,
        xp_reward,
        applicants: 0,
        qr_code_token: format!("{id}-token"),
        accept_applications_wg: false,
        series_id: None,
        series_index: None,
        is_recurring: false,
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    }
}

/// A date safely in the past relative to today's UTC window.
#[allow(dead_code)]
pub fn days_ago(days: u64) -> NaiveDate {
    chrono::Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .unwrap()
}
