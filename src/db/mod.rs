//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const MEMBERS: &str = "members";
    /// Referral code reservations (keyed by code)
    pub const MEMBER_CODES: &str = "member_codes";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const ACTIVITIES: &str = "activities";
    /// Applications, keyed by `{activity_id}_{member_id}`
    pub const APPLICATIONS: &str = "applications";
    /// Validation records, keyed by `{activity_id}_{member_id}`
    pub const VALIDATIONS: &str = "validations";
    /// Participation aggregates, keyed by `{org_id}_{member_id}`
    pub const PARTICIPANT_RECORDS: &str = "participant_records";
    /// Append-only XP ledger (UUID keys, queried by member_id)
    pub const XP_HISTORY: &str = "xp_history";
    pub const NOTIFICATIONS: &str = "notifications";
    /// Badge catalog overrides
    pub const BADGES: &str = "badges";
    pub const IDEA_BOX: &str = "idea_box";
    pub const FAQ: &str = "faq";
}
