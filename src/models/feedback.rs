// SPDX-License-Identifier: MIT

//! Idea-box feedback entries and localized FAQ documents.

use serde::{Deserialize, Serialize};

use crate::locale::LocalizedText;

/// Write-once user feedback entry, keyed by UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaEntry {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub locale: String,
    pub created_at: String,
}

/// FAQ document with per-locale question/answer maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: LocalizedText,
    pub answer: LocalizedText,
    #[serde(default)]
    pub order: u32,
}
