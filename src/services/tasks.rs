// SPDX-License-Identifier: MIT

//! Cloud Tasks service for deferred and rate-limited work.
//!
//! This service creates Cloud Tasks for:
//! - Per-activity reminder fan-out (queued by the daily reminder sweep)
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MAX_CONCURRENT_TASKS: usize = 100;

/// Payload for the per-activity reminder task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReminderPayload {
    pub activity_id: String,
    /// Occurrence start date the reminder announces (ISO 8601 date)
    pub occurrence_start: String,
}

/// Result of a batch reminder queue operation.
#[derive(Debug, Clone, Default)]
pub struct ReminderQueueResult {
    pub queued: u32,
    pub failed: u32,
    pub failed_ids: Vec<String>,
}

impl ReminderQueueResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    /// Mock: activity IDs that should fail when queued (test builds only).
    #[cfg(test)]
    mock_fail_ids: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::REMINDER_QUEUE_NAME.to_string(),
            #[cfg(test)]
            mock_fail_ids: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Set activity IDs that should fail when queued (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail_ids(&self, ids: impl IntoIterator<Item = String>) {
        let mut guard = self.mock_fail_ids.lock().unwrap();
        guard.clear();
        guard.extend(ids);
    }

    /// Queue a single reminder task.
    pub async fn queue_send_reminder(
        &self,
        service_url: &str,
        payload: SendReminderPayload,
    ) -> Result<()> {
        self.queue_task(service_url, "/tasks/send-reminder", &payload)
            .await
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "voluntree-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }

    /// Queue reminder tasks for a batch of upcoming activities.
    ///
    /// Returns per-activity success/failure so the sweep can log what was
    /// dropped; failed activities are retried on the next sweep.
    pub async fn queue_reminders(
        &self,
        service_url: &str,
        payloads: Vec<SendReminderPayload>,
    ) -> ReminderQueueResult {
        let count = payloads.len();
        let batch_success = Arc::new(AtomicU64::new(0));
        let failed_ids = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        stream::iter(payloads)
            .for_each_concurrent(MAX_CONCURRENT_TASKS, |payload| {
                let batch_success = Arc::clone(&batch_success);
                let failed_ids = Arc::clone(&failed_ids);
                async move {
                    // Check for mock failures in test builds
                    #[cfg(test)]
                    {
                        let should_fail = self
                            .mock_fail_ids
                            .lock()
                            .unwrap()
                            .contains(&payload.activity_id);
                        if should_fail {
                            tracing::warn!(activity_id = %payload.activity_id, "Mock failure for reminder");
                            failed_ids.lock().await.push(payload.activity_id.clone());
                            return;
                        }
                    }

                    let activity_id = payload.activity_id.clone();
                    match self.queue_send_reminder(service_url, payload).await {
                        Ok(_) => {
                            batch_success.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            tracing::warn!(
                                activity_id = %activity_id,
                                error = ?e,
                                "Failed to queue reminder"
                            );
                            failed_ids.lock().await.push(activity_id);
                        }
                    }
                }
            })
            .await;

        let queued = batch_success.load(Ordering::Relaxed) as u32;
        let failed_ids = Arc::try_unwrap(failed_ids)
            .expect("All tasks completed, should have sole ownership")
            .into_inner();
        let failed = failed_ids.len() as u32;

        tracing::info!(
            requested = count,
            succeeded = queued,
            failed = failed,
            "Queued activity reminders"
        );

        ReminderQueueResult {
            queued,
            failed,
            failed_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: &str) -> SendReminderPayload {
        SendReminderPayload {
            activity_id: id.to_string(),
            occurrence_start: "2025-03-01".to_string(),
        }
    }

    #[test]
    fn empty_result_is_success() {
        let result = ReminderQueueResult::default();
        assert!(result.is_complete_success());
    }

    #[tokio::test]
    async fn queue_reminders_mock_failures_are_reported() {
        let service = TasksService::new("test-project", "us-central1");
        service.set_mock_fail_ids(["a2".to_string(), "a3".to_string()]);

        let result = service
            .queue_reminders(
                "http://localhost",
                vec![payload("a1"), payload("a2"), payload("a3")],
            )
            .await;

        // a2/a3 fail via mock, a1 fails because no Cloud Tasks backend exists
        assert!(result.failed_ids.contains(&"a2".to_string()));
        assert!(result.failed_ids.contains(&"a3".to_string()));
        assert_eq!(result.queued, 0);
        assert_eq!(result.failed, 3);
    }

    #[tokio::test]
    async fn queue_reminders_empty_input() {
        let service = TasksService::new("test-project", "us-central1");
        let result = service.queue_reminders("http://localhost", vec![]).await;
        assert!(result.is_complete_success());
        assert_eq!(result.queued, 0);
    }
}
