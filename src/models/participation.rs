// SPDX-License-Identifier: MIT

//! Validation and participant records.

use serde::{Deserialize, Serialize};

use crate::models::activity::ActivityType;

/// Proof-of-participation record, unique per (activity, member).
///
/// Keyed by `{activity_id}_{member_id}`; append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub activity_id: String,
    pub member_id: String,
    pub org_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub xp_granted: u32,
    pub validated_at: String,
}

/// Per-(organization, member) participation aggregate.
///
/// Keyed by `{org_id}_{member_id}`. Type flags are monotonic: they are set
/// true the first time the member is validated for that type and never
/// cleared. Creating the record increments the organization's
/// `total_participants` exactly once, in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub org_id: String,
    pub member_id: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub event: bool,
    pub created_at: String,
    pub last_validated_at: String,
}

impl ParticipantRecord {
    /// Fresh record for a first validation of the given type.
    pub fn new(org_id: &str, member_id: &str, activity_type: ActivityType, now: &str) -> Self {
        let mut record = Self {
            org_id: org_id.to_string(),
            member_id: member_id.to_string(),
            online: false,
            local: false,
            event: false,
            created_at: now.to_string(),
            last_validated_at: now.to_string(),
        };
        record.mark(activity_type, now);
        record
    }

    /// Set the flag for a validated type and refresh `last_validated_at`.
    pub fn mark(&mut self, activity_type: ActivityType, now: &str) {
        match activity_type {
            ActivityType::Online => self.online = true,
            ActivityType::Local => self.local = true,
            ActivityType::Event => self.event = true,
        }
        self.last_validated_at = now.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_sets_only_validated_type() {
        let r = ParticipantRecord::new("o1", "m1", ActivityType::Local, "t0");
        assert!(!r.online);
        assert!(r.local);
        assert!(!r.event);
        assert_eq!(r.created_at, "t0");
    }

    #[test]
    fn flags_are_monotonic() {
        let mut r = ParticipantRecord::new("o1", "m1", ActivityType::Online, "t0");
        r.mark(ActivityType::Event, "t1");
        r.mark(ActivityType::Online, "t2");
        assert!(r.online);
        assert!(r.event);
        assert!(!r.local);
        assert_eq!(r.last_validated_at, "t2");
        assert_eq!(r.created_at, "t0");
    }
}
