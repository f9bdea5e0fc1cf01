// SPDX-License-Identifier: MIT

//! Activity and application models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How an activity is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Online,
    Local,
    Event,
}

/// How often the activity repeats for a volunteer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Regular,
    /// Ongoing role with higher commitment
    Role,
}

/// Publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    Draft,
    Open,
    Closed,
}

impl ActivityStatus {
    /// Allowed lifecycle transitions: Draft → Open → Closed.
    pub fn can_transition_to(self, next: ActivityStatus) -> bool {
        matches!(
            (self, next),
            (ActivityStatus::Draft, ActivityStatus::Open)
                | (ActivityStatus::Open, ActivityStatus::Closed)
        )
    }
}

/// Activity published by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Document ID
    pub id: String,
    pub org_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Skill category (consulting, translation, cleaning, ...)
    pub category: String,
    pub frequency: Frequency,
    /// Weekly time commitment score, 0..=100
    pub time_commitment: Option<f64>,
    /// Complexity score, 0..=100
    pub complexity: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ActivityStatus,
    /// XP granted on validation; computed at create/update
    pub xp_reward: u32,
    /// Number of applications received
    #[serde(default)]
    pub applicants: u32,
    /// Opaque token embedded in the printed/displayed QR code
    pub qr_code_token: String,
    /// Whether applications are accepted without review
    #[serde(default)]
    pub accept_applications_wg: bool,

    /// Shared ID of the recurrence series this occurrence belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    /// Position within the series, 0-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_index: Option<u32>,
    #[serde(default)]
    pub is_recurring: bool,

    pub created_at: String,
}

/// Application lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

/// A member's request to participate in an activity.
///
/// Keyed by `{activity_id}_{member_id}`, so at most one non-cancelled
/// application can exist per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub activity_id: String,
    pub member_id: String,
    pub org_id: String,
    pub status: ApplicationStatus,
    pub created_at: String,
    pub updated_at: String,
}
