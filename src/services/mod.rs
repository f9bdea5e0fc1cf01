// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod activities;
pub mod badges;
pub mod identity;
pub mod notifications;
pub mod oidc;
pub mod recurrence;
pub mod referral;
pub mod tasks;
pub mod validation;
pub mod xp;

pub use activities::{ActivityService, NewActivity};
pub use badges::BadgeEngine;
pub use identity::IdentityService;
pub use notifications::{NotificationContent, NotificationService, PushService};
pub use oidc::{OidcError, OidcVerifier, VerifiedTaskPrincipal};
pub use referral::ReferralService;
pub use tasks::TasksService;
pub use validation::{ValidationEngine, ValidationSuccess};
