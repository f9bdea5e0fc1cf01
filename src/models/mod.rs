// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod badge;
pub mod feedback;
pub mod member;
pub mod notification;
pub mod organization;
pub mod participation;
pub mod xp_history;

pub use activity::{
    Activity, ActivityStatus, ActivityType, Application, ApplicationStatus, Frequency,
};
pub use badge::{BadgeDefinition, BadgeRule, BadgeTrigger};
pub use feedback::{FaqEntry, IdeaEntry};
pub use member::{ChannelPreferences, Member, NotificationPreferences};
pub use notification::{Notification, NotificationCategory};
pub use organization::Organization;
pub use participation::{ParticipantRecord, ValidationRecord};
pub use xp_history::{XpEntryKind, XpHistoryEntry};
