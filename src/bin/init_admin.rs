// SPDX-License-Identifier: MIT

//! Admin script: grant the `admin=true` custom claim to an account.
//!
//! Usage: `ADMIN_ACCESS_TOKEN=$(gcloud auth print-access-token) init_admin <email>`
//!
//! The claim update also revokes the account's refresh tokens, so the new
//! claim is picked up on the next sign-in.

use serde_json::json;
use voluntree::config::Config;
use voluntree::services::IdentityService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let email = std::env::args()
        .nth(1)
        .ok_or("usage: init_admin <email>")?;
    let access_token =
        std::env::var("ADMIN_ACCESS_TOKEN").map_err(|_| "ADMIN_ACCESS_TOKEN must be set")?;

    let config = Config::from_env()?;
    let identity = IdentityService::new(&config.gcp_project_id, &access_token);

    let uid = identity
        .lookup_uid_by_email(&email)
        .await?
        .ok_or_else(|| format!("no account found for {email}"))?;

    identity
        .set_custom_claims(&uid, &json!({ "admin": true }))
        .await?;

    tracing::info!(email, uid, "Admin claim granted, refresh tokens revoked");
    Ok(())
}
