// SPDX-License-Identifier: MIT

//! Identity provider delegation.
//!
//! Custom claims live with the auth provider, not in the store. Setting
//! claims also bumps `validSince`, which revokes outstanding refresh tokens
//! so the new claims take effect on the next sign-in.

use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Client for the identity toolkit admin API.
#[derive(Clone)]
pub struct IdentityService {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
}

impl IdentityService {
    pub fn new(project_id: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            project_id: project_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set custom claims for a user and revoke their refresh tokens.
    pub async fn set_custom_claims(&self, uid: &str, claims: &serde_json::Value) -> Result<()> {
        let url = format!(
            "{}/projects/{}/accounts:update",
            self.base_url, self.project_id
        );

        let body = json!({
            "localId": uid,
            "customAttributes": claims.to_string(),
            // Revokes refresh tokens issued before now.
            "validSince": chrono::Utc::now().timestamp().to_string(),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "identity provider rejected claims update: HTTP {}: {}",
                status,
                text
            )));
        }

        tracing::info!(uid, claims = %claims, "Custom claims updated, refresh tokens revoked");
        Ok(())
    }

    /// Resolve a uid by account email.
    pub async fn lookup_uid_by_email(&self, email: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/projects/{}/accounts:lookup",
            self.base_url, self.project_id
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "email": [email] }))
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Internal(anyhow::anyhow!(
                "identity lookup failed: HTTP {}",
                status
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("identity lookup parse error: {}", e)))?;

        Ok(lookup.users.into_iter().next().map(|u| u.local_id))
    }
}
