// SPDX-License-Identifier: MIT

//! Voluntree: gamified volunteering for non-profits
//!
//! This crate provides the backend engine that records validated
//! participation, credits XP, grants badges and fans out notifications.

pub mod config;
pub mod db;
pub mod error;
pub mod locale;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::FirestoreDb;
use services::{
    ActivityService, BadgeEngine, NotificationService, OidcVerifier, ReferralService, TasksService,
    ValidationEngine,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub tasks: TasksService,
    pub notifier: NotificationService,
    pub badges: BadgeEngine,
    pub validation: ValidationEngine,
    pub activities: ActivityService,
    pub referral: ReferralService,
    pub oidc_verifier: Arc<OidcVerifier>,
}
