// SPDX-License-Identifier: MIT

//! Organization (NPO) model with denormalized participation counters.
//!
//! Counters mirror the size of the corresponding authoritative collections
//! and are only mutated inside the same transaction that creates or removes
//! the counted entity.

use serde::{Deserialize, Serialize};

use crate::models::activity::ActivityType;

/// Organization document, keyed by org id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Uid of the member managing this NPO (receives new-application
    /// notifications)
    pub owner_uid: String,

    #[serde(default)]
    pub total_online_activities: u32,
    #[serde(default)]
    pub total_local_activities: u32,
    #[serde(default)]
    pub total_events: u32,
    /// Distinct members ever validated for this organization
    #[serde(default)]
    pub total_participants: u32,
    /// Applications currently pending review
    #[serde(default)]
    pub total_new_applications: u32,

    pub created_at: String,
}

impl Organization {
    /// Counter field tracking activities of the given type.
    pub fn activity_counter_mut(&mut self, activity_type: ActivityType) -> &mut u32 {
        match activity_type {
            ActivityType::Online => &mut self.total_online_activities,
            ActivityType::Local => &mut self.total_local_activities,
            ActivityType::Event => &mut self.total_events,
        }
    }
}
