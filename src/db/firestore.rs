// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Members (profiles, XP, badges, referral codes)
//! - Organizations (counters, participant records)
//! - Activities, applications and validation records
//! - XP history ledger and notifications
//!
//! All multi-document invariants (XP vs. ledger, participant counters,
//! at-most-once validations and badge grants) are maintained inside
//! Firestore transactions.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use futures_util::{stream, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityStatus, Application, ApplicationStatus, BadgeDefinition, FaqEntry, IdeaEntry,
    Member, Notification, Organization, ParticipantRecord, ValidationRecord, XpEntryKind,
    XpHistoryEntry,
};
use crate::time_utils::format_utc_rfc3339;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Transaction attempts before surfacing `Transient` to the caller.
const TXN_MAX_ATTEMPTS: u32 = 5;

/// Base delay for transaction retry backoff.
const TXN_BACKOFF_BASE_MS: u64 = 50;

/// Referral-code reservation document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CodeReservation {
    code: String,
    uid: String,
    reserved_at: String,
}

/// Result of a committed validation transaction.
#[derive(Debug, Clone)]
pub struct ValidationCommit {
    pub xp_granted: u32,
    pub member_xp_after: u64,
    /// Whether a new participant record was created for the organization
    pub new_participant: bool,
}

/// One page of the XP ledger.
#[derive(Debug, Clone)]
pub struct XpHistoryPage {
    pub entries: Vec<XpHistoryEntry>,
    /// Opaque cursor for the next page, if any
    pub next_cursor: Option<String>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Member Operations ───────────────────────────────────────

    /// Get a member by auth uid.
    pub async fn get_member(&self, uid: &str) -> Result<Option<Member>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::MEMBERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a member.
    pub async fn upsert_member(&self, member: &Member) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MEMBERS)
            .document_id(&member.uid)
            .object(member)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find a member by referral code.
    pub async fn find_member_by_code(&self, code: &str) -> Result<Option<Member>, AppError> {
        let code = code.to_string();
        let members: Vec<Member> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MEMBERS)
            .filter(move |q| q.for_all([q.field("code").eq(code.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(members.into_iter().next())
    }

    /// Count members who signed up with the given referral code.
    pub async fn count_members_referred_by(&self, code: &str) -> Result<usize, AppError> {
        let code = code.to_string();
        let members: Vec<Member> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MEMBERS)
            .filter(move |q| q.for_all([q.field("referred_by").eq(code.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(members.len())
    }

    /// Atomically reserve a referral code.
    ///
    /// Returns `false` when the code is already taken (including losing a
    /// concurrent race for the same code); the caller then mutates the code
    /// and retries.
    pub async fn try_reserve_code(&self, code: &str, uid: &str) -> Result<bool, AppError> {
        let client = self.get_client()?;

        let reservation = CodeReservation {
            code: code.to_string(),
            uid: uid.to_string(),
            reserved_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        // Document creation is atomic: it fails when the code document
        // already exists, so of two concurrent writers exactly one wins.
        let created: Result<CodeReservation, _> = client
            .fluent()
            .insert()
            .into(collections::MEMBER_CODES)
            .document_id(code)
            .object(&reservation)
            .execute()
            .await;

        match created {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!(code, error = %e, "Code reservation lost");
                Ok(false)
            }
        }
    }

    /// Remove a push token from a member document (after permanent delivery
    /// failure). Best-effort read-modify-write.
    pub async fn remove_fcm_token(&self, uid: &str, token: &str) -> Result<(), AppError> {
        if let Some(mut member) = self.get_member(uid).await? {
            let before = member.fcm_tokens.len();
            member.fcm_tokens.retain(|t| t != token);
            if member.fcm_tokens.len() != before {
                self.upsert_member(&member).await?;
                tracing::info!(uid, "Removed stale push token");
            }
        }
        Ok(())
    }

    // ─── Organization Operations ─────────────────────────────────

    pub async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ORGANIZATIONS)
            .obj()
            .one(org_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_organization(&self, org: &Organization) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ORGANIZATIONS)
            .document_id(&org.org_id)
            .object(org)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a participant record for (organization, member).
    pub async fn get_participant_record(
        &self,
        org_id: &str,
        member_id: &str,
    ) -> Result<Option<ParticipantRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PARTICIPANT_RECORDS)
            .obj()
            .one(participant_doc_id(org_id, member_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All participant records of an organization.
    pub async fn list_participant_records(
        &self,
        org_id: &str,
    ) -> Result<Vec<ParticipantRecord>, AppError> {
        let org_id = org_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PARTICIPANT_RECORDS)
            .filter(move |q| q.for_all([q.field("org_id").eq(org_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    pub async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Plain activity write (status transitions, edits while Draft).
    pub async fn set_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Activities of one organization, newest first.
    pub async fn list_activities_for_org(
        &self,
        org_id: &str,
        limit: u32,
    ) -> Result<Vec<Activity>, AppError> {
        let org_id = org_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.for_all([q.field("org_id").eq(org_id.clone())]))
            .order_by([(
                "start_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Open activities starting on a given date (reminder sweep).
    pub async fn list_activities_starting_on(
        &self,
        date: chrono::NaiveDate,
    ) -> Result<Vec<Activity>, AppError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.for_all([q.field("start_date").eq(date_str.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically create a batch of activities (a recurrence series or a
    /// single activity) and bump the organization's per-type counters.
    pub async fn create_activities_atomic(
        &self,
        activities: &[Activity],
    ) -> Result<(), AppError> {
        if activities.is_empty() {
            return Ok(());
        }
        let org_id = activities[0].org_id.clone();

        retry_transaction("create_activities", || async {
            let client = self.get_client()?;

            let mut org = self
                .get_organization(&org_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Organization {}", org_id)))?;

            for activity in activities {
                *org.activity_counter_mut(activity.activity_type) += 1;
            }

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for activity in activities {
                client
                    .fluent()
                    .update()
                    .in_col(collections::ACTIVITIES)
                    .document_id(&activity.id)
                    .object(activity)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add activity to transaction: {}", e))
                    })?;
            }

            client
                .fluent()
                .update()
                .in_col(collections::ORGANIZATIONS)
                .document_id(&org.org_id)
                .object(&org)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add organization to transaction: {}", e))
                })?;

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Delete an activity that is still in Draft, decrementing the counter.
    pub async fn delete_draft_activity_atomic(&self, activity_id: &str) -> Result<(), AppError> {
        retry_transaction("delete_draft_activity", || async {
            let client = self.get_client()?;

            let activity = self
                .get_activity(activity_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;
            if activity.status != ActivityStatus::Draft {
                return Err(AppError::Precondition(
                    "only draft activities can be deleted".to_string(),
                ));
            }

            let mut org = self
                .get_organization(&activity.org_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Organization {}", activity.org_id)))?;
            let counter = org.activity_counter_mut(activity.activity_type);
            *counter = counter.saturating_sub(1);

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            client
                .fluent()
                .delete()
                .from(collections::ACTIVITIES)
                .document_id(activity_id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::ORGANIZATIONS)
                .document_id(&org.org_id)
                .object(&org)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add organization to transaction: {}", e))
                })?;

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    // ─── Application Operations ──────────────────────────────────

    pub async fn get_application(
        &self,
        activity_id: &str,
        member_id: &str,
    ) -> Result<Option<Application>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::APPLICATIONS)
            .obj()
            .one(application_doc_id(activity_id, member_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Member ids with an accepted application for an activity (reminder
    /// fan-out).
    pub async fn list_accepted_member_ids(
        &self,
        activity_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let activity_id = activity_id.to_string();
        let applications: Vec<Application> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::APPLICATIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("activity_id").eq(activity_id.clone()),
                    q.field("status").eq("accepted"),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(applications.into_iter().map(|a| a.member_id).collect())
    }

    /// Atomically create an application and maintain counters.
    ///
    /// Fails with `Precondition` when a non-cancelled application already
    /// exists for the (member, activity) pair.
    pub async fn create_application_atomic(
        &self,
        application: &Application,
    ) -> Result<(), AppError> {
        retry_transaction("create_application", || async {
            let client = self.get_client()?;

            let existing = self
                .get_application(&application.activity_id, &application.member_id)
                .await?;
            if let Some(existing) = existing {
                if existing.status != ApplicationStatus::Cancelled {
                    return Err(AppError::Precondition(
                        "an application already exists for this activity".to_string(),
                    ));
                }
            }

            let mut activity = self
                .get_activity(&application.activity_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Activity {}", application.activity_id))
                })?;
            activity.applicants += 1;

            let mut org = self
                .get_organization(&application.org_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Organization {}", application.org_id)))?;
            if application.status == ApplicationStatus::Pending {
                org.total_new_applications += 1;
            }

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            client
                .fluent()
                .update()
                .in_col(collections::APPLICATIONS)
                .document_id(application_doc_id(
                    &application.activity_id,
                    &application.member_id,
                ))
                .object(application)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add application to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::ACTIVITIES)
                .document_id(&activity.id)
                .object(&activity)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add activity to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::ORGANIZATIONS)
                .document_id(&org.org_id)
                .object(&org)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add organization to transaction: {}", e))
                })?;

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Atomically transition an application's status and maintain the
    /// organization's pending counter.
    pub async fn transition_application_atomic(
        &self,
        activity_id: &str,
        member_id: &str,
        new_status: ApplicationStatus,
    ) -> Result<Application, AppError> {
        retry_transaction("transition_application", || async {
            let client = self.get_client()?;

            let mut application = self
                .get_application(activity_id, member_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Application {}/{}", activity_id, member_id))
                })?;

            if application.status == new_status {
                return Ok(application);
            }

            let mut org = self
                .get_organization(&application.org_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Organization {}", application.org_id))
                })?;
            if application.status == ApplicationStatus::Pending {
                org.total_new_applications = org.total_new_applications.saturating_sub(1);
            }

            application.status = new_status;
            application.updated_at = format_utc_rfc3339(chrono::Utc::now());

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            client
                .fluent()
                .update()
                .in_col(collections::APPLICATIONS)
                .document_id(application_doc_id(activity_id, member_id))
                .object(&application)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add application to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::ORGANIZATIONS)
                .document_id(&org.org_id)
                .object(&org)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add organization to transaction: {}", e))
                })?;

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
            Ok(application)
        })
        .await
    }

    // ─── Validation Operations ───────────────────────────────────

    pub async fn get_validation(
        &self,
        activity_id: &str,
        member_id: &str,
    ) -> Result<Option<ValidationRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::VALIDATIONS)
            .obj()
            .one(validation_doc_id(activity_id, member_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of validations a member has accumulated.
    pub async fn count_validations_for_member(&self, member_id: &str) -> Result<usize, AppError> {
        let member_id = member_id.to_string();
        let records: Vec<ValidationRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::VALIDATIONS)
            .filter(move |q| q.for_all([q.field("member_id").eq(member_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(records.len())
    }

    // ─── Atomic Validation Processing ────────────────────────────

    /// Atomically record a validation: validation record, member XP credit,
    /// ledger entry, participant record upsert, organization counter, and
    /// application acceptance.
    ///
    /// All writes succeed or fail together. The duplicate check re-reads the
    /// validation record on every attempt, so a replay that lost a race
    /// surfaces `AlreadyValidated` rather than double-crediting.
    pub async fn record_validation_atomic(
        &self,
        activity: &Activity,
        member_id: &str,
    ) -> Result<ValidationCommit, AppError> {
        retry_transaction("record_validation", || async {
            let client = self.get_client()?;
            let now = format_utc_rfc3339(chrono::Utc::now());

            // 1. Duplicate check, re-read on every attempt
            if self.get_validation(&activity.id, member_id).await?.is_some() {
                return Err(AppError::AlreadyValidated);
            }

            // 2. Member must exist (deleted accounts keep their QR screenshots)
            let mut member = self
                .get_member(member_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Member {}", member_id)))?;

            let xp_granted = activity.xp_reward;
            member.xp += u64::from(xp_granted);
            member.last_active = now.clone();

            // 3. Participant record upsert + organization counter
            let mut org = self
                .get_organization(&activity.org_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Organization {}", activity.org_id)))?;

            let existing_record = self
                .get_participant_record(&activity.org_id, member_id)
                .await?;
            let new_participant = existing_record.is_none();
            let participant_record = match existing_record {
                Some(mut record) => {
                    record.mark(activity.activity_type, &now);
                    record
                }
                None => {
                    org.total_participants += 1;
                    ParticipantRecord::new(&activity.org_id, member_id, activity.activity_type, &now)
                }
            };

            // 4. Pending application becomes accepted (unconditionally)
            let application = self.get_application(&activity.id, member_id).await?;
            let accepted_application = application.map(|mut app| {
                if app.status == ApplicationStatus::Pending {
                    org.total_new_applications = org.total_new_applications.saturating_sub(1);
                }
                app.status = ApplicationStatus::Accepted;
                app.updated_at = now.clone();
                app
            });

            let validation = ValidationRecord {
                activity_id: activity.id.clone(),
                member_id: member_id.to_string(),
                org_id: activity.org_id.clone(),
                activity_type: activity.activity_type,
                xp_granted,
                validated_at: now.clone(),
            };

            let ledger_entry = XpHistoryEntry {
                member_id: member_id.to_string(),
                title: activity.title.clone(),
                timestamp: now.clone(),
                points: xp_granted,
                kind: XpEntryKind::Activity,
                source_id: activity.id.clone(),
            };

            // 5. Stage all writes and commit
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            client
                .fluent()
                .update()
                .in_col(collections::VALIDATIONS)
                .document_id(validation_doc_id(&activity.id, member_id))
                .object(&validation)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add validation to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::MEMBERS)
                .document_id(&member.uid)
                .object(&member)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add member to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::XP_HISTORY)
                .document_id(Uuid::new_v4().to_string())
                .object(&ledger_entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add ledger entry to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::PARTICIPANT_RECORDS)
                .document_id(participant_doc_id(&activity.org_id, member_id))
                .object(&participant_record)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add participant record to transaction: {}",
                        e
                    ))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::ORGANIZATIONS)
                .document_id(&org.org_id)
                .object(&org)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add organization to transaction: {}", e))
                })?;

            if let Some(app) = &accepted_application {
                client
                    .fluent()
                    .update()
                    .in_col(collections::APPLICATIONS)
                    .document_id(application_doc_id(&activity.id, member_id))
                    .object(app)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add application to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

            tracing::info!(
                member_id,
                activity_id = %activity.id,
                xp_granted,
                new_participant,
                "Validation recorded atomically"
            );

            Ok(ValidationCommit {
                xp_granted,
                member_xp_after: member.xp,
                new_participant,
            })
        })
        .await
    }

    // ─── Badge Grants ────────────────────────────────────────────

    /// Atomically grant a badge: add to the member's badge set, credit its
    /// XP and append a ledger entry.
    ///
    /// Returns `Ok(false)` when the badge is already held, guaranteeing
    /// at-most-once XP credit per (member, badge).
    pub async fn grant_badge_atomic(
        &self,
        member_id: &str,
        badge: &BadgeDefinition,
    ) -> Result<bool, AppError> {
        retry_transaction("grant_badge", || async {
            let client = self.get_client()?;
            let now = format_utc_rfc3339(chrono::Utc::now());

            let mut member = self
                .get_member(member_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Member {}", member_id)))?;

            if member.has_badge(&badge.id) {
                return Ok(false);
            }

            member.badges.push(badge.id.clone());
            member.xp += u64::from(badge.xp_reward);

            let ledger_entry = XpHistoryEntry {
                member_id: member_id.to_string(),
                title: badge.name.clone(),
                timestamp: now,
                points: badge.xp_reward,
                kind: XpEntryKind::Badge,
                source_id: badge.id.clone(),
            };

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            client
                .fluent()
                .update()
                .in_col(collections::MEMBERS)
                .document_id(&member.uid)
                .object(&member)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add member to transaction: {}", e))
                })?;

            client
                .fluent()
                .update()
                .in_col(collections::XP_HISTORY)
                .document_id(Uuid::new_v4().to_string())
                .object(&ledger_entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add ledger entry to transaction: {}", e))
                })?;

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

            tracing::info!(
                member_id,
                badge_id = %badge.id,
                xp = badge.xp_reward,
                "Badge granted"
            );
            Ok(true)
        })
        .await
    }

    /// Badge catalog overrides stored by administrators.
    pub async fn list_badge_catalog(&self) -> Result<Vec<BadgeDefinition>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BADGES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_badge_definition(&self, badge: &BadgeDefinition) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BADGES)
            .document_id(&badge.id)
            .object(badge)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── XP History Ledger ───────────────────────────────────────

    /// One ledger page, newest first, with an opaque continuation cursor.
    pub async fn get_xp_history(
        &self,
        member_id: &str,
        cursor: Option<&str>,
        per_page: u32,
    ) -> Result<XpHistoryPage, AppError> {
        let member_id_owned = member_id.to_string();
        let before = cursor.map(decode_cursor).transpose()?;

        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::XP_HISTORY);

        let query = if let Some(before) = before {
            query.filter(move |q| {
                q.for_all([
                    q.field("member_id").eq(member_id_owned.clone()),
                    q.field("timestamp").less_than(before.clone()),
                ])
            })
        } else {
            query.filter(move |q| q.for_all([q.field("member_id").eq(member_id_owned.clone())]))
        };

        let entries: Vec<XpHistoryEntry> = query
            .order_by([(
                "timestamp",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(per_page)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let next_cursor = if entries.len() as u32 == per_page {
            entries.last().map(|e| encode_cursor(&e.timestamp))
        } else {
            None
        };

        Ok(XpHistoryPage {
            entries,
            next_cursor,
        })
    }

    /// All ledger entries for a member (consistency checks, tests).
    pub async fn list_all_xp_history(
        &self,
        member_id: &str,
    ) -> Result<Vec<XpHistoryEntry>, AppError> {
        let member_id = member_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::XP_HISTORY)
            .filter(move |q| q.for_all([q.field("member_id").eq(member_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Notification Operations ─────────────────────────────────

    pub async fn create_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::NOTIFICATIONS)
            .document_id(&notification.id)
            .object(notification)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::NOTIFICATIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Notifications for a user, newest first.
    pub async fn list_notifications_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Notification>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark one notification read. Idempotent: `read_at` is only ever set
    /// once.
    pub async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<(), AppError> {
        let Some(mut notification) = self.get_notification(id).await? else {
            return Err(AppError::NotFound(format!("Notification {}", id)));
        };
        if notification.user_id != user_id {
            return Err(AppError::Permission(
                "notification belongs to another user".to_string(),
            ));
        }
        if notification.read_at.is_none() {
            notification.read_at = Some(format_utc_rfc3339(chrono::Utc::now()));
            self.create_notification(&notification).await?;
        }
        Ok(())
    }

    /// Mark all of a user's unread notifications read.
    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize, AppError> {
        let unread: Vec<Notification> = self
            .list_notifications_for_user(user_id, 500)
            .await?
            .into_iter()
            .filter(|n| n.read_at.is_none())
            .collect();

        let now = format_utc_rfc3339(chrono::Utc::now());
        let count = unread.len();

        stream::iter(unread)
            .map(|mut notification| {
                let now = now.clone();
                async move {
                    notification.read_at = Some(now);
                    self.create_notification(&notification).await
                }
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(count)
    }

    // ─── Idea Box & FAQ ──────────────────────────────────────────

    /// Write-once idea box entry.
    pub async fn create_idea(&self, idea: &IdeaEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::IDEA_BOX)
            .document_id(&idea.id)
            .object(idea)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn list_faq(&self) -> Result<Vec<FaqEntry>, AppError> {
        let mut entries: Vec<FaqEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::FAQ)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        entries.sort_by_key(|e| e.order);
        Ok(entries)
    }
}

// ─── Document ID Helpers ─────────────────────────────────────────

pub fn validation_doc_id(activity_id: &str, member_id: &str) -> String {
    format!("{}_{}", activity_id, member_id)
}

pub fn application_doc_id(activity_id: &str, member_id: &str) -> String {
    format!("{}_{}", activity_id, member_id)
}

pub fn participant_doc_id(org_id: &str, member_id: &str) -> String {
    format!("{}_{}", org_id, member_id)
}

// ─── Cursor Helpers ──────────────────────────────────────────────

fn encode_cursor(timestamp: &str) -> String {
    URL_SAFE_NO_PAD.encode(timestamp.as_bytes())
}

fn decode_cursor(cursor: &str) -> Result<String, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| AppError::BadRequest("invalid cursor".to_string()))?;
    String::from_utf8(bytes).map_err(|_| AppError::BadRequest("invalid cursor".to_string()))
}

// ─── Transaction Retry ───────────────────────────────────────────

/// Run a transactional operation with bounded exponential backoff.
///
/// Database-level failures (commit conflicts included) retry up to
/// [`TXN_MAX_ATTEMPTS`] times; exhaustion surfaces `Transient` so the
/// caller knows the operation may be replayed safely. Domain errors pass
/// through untouched.
async fn retry_transaction<T, F, Fut>(op: &str, mut attempt_fn: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(AppError::Database(msg)) => {
                attempt += 1;
                if attempt >= TXN_MAX_ATTEMPTS {
                    tracing::error!(op, attempts = attempt, error = %msg, "Transaction retries exhausted");
                    return Err(AppError::Transient(format!("{}: {}", op, msg)));
                }
                let delay = backoff_delay(attempt);
                tracing::warn!(op, attempt, delay_ms = delay.as_millis() as u64, error = %msg, "Transaction failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn backoff_delay(attempt: u32) -> std::time::Duration {
    let base = TXN_BACKOFF_BASE_MS << (attempt - 1);
    let jitter = rand::thread_rng().gen_range(0..TXN_BACKOFF_BASE_MS);
    std::time::Duration::from_millis(base + jitter)
}
