// SPDX-License-Identifier: MIT

//! Append-only per-member XP ledger.

use serde::{Deserialize, Serialize};

/// What earned the XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XpEntryKind {
    Activity,
    Badge,
}

/// One XP-earning event.
///
/// Stored flat in the `xp_history` collection with a UUID document id and
/// queried by `member_id`, ordered by `timestamp desc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpHistoryEntry {
    pub member_id: String,
    /// Human-readable title (activity title or badge name)
    pub title: String,
    /// RFC3339 timestamp
    pub timestamp: String,
    pub points: u32,
    #[serde(rename = "type")]
    pub kind: XpEntryKind,
    /// Activity id or badge id that produced this entry
    pub source_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_roundtrip() {
        let entry = XpHistoryEntry {
            member_id: "m1".to_string(),
            title: "Beach cleanup".to_string(),
            timestamp: "2025-01-15T10:00:00Z".to_string(),
            points: 18,
            kind: XpEntryKind::Activity,
            source_id: "a1".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"activity\""));
        let back: XpHistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, XpEntryKind::Activity);
        assert_eq!(back.points, 18);
    }
}
