//! Application configuration loaded from environment variables.
//!
//! In production, secrets are injected as environment variables by the
//! deployment platform's secret bindings, so no secret-manager round trips
//! happen at runtime.

use std::env;

/// Cloud Tasks queue used for activity reminders.
pub const REMINDER_QUEUE_NAME: &str = "activity-reminders";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL used in share links and notification deep links (APP_URL)
    pub app_url: String,
    /// Public URL of this API (for Cloud Tasks callbacks)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (Cloud Tasks queue location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,

    // --- Secrets (injected as env vars) ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Server key for the push delivery backend (PUSH_SERVICE_CREDENTIALS)
    pub push_service_credentials: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            push_service_credentials: env::var("PUSH_SERVICE_CREDENTIALS")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            push_service_credentials: String::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
