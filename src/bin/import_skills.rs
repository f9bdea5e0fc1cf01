// SPDX-License-Identifier: MIT

//! Admin script: seed the skill/badge catalog.
//!
//! Usage: `import_skills [catalog.json]`
//!
//! Without an argument the built-in catalog is written. With one, the file
//! must contain a JSON array of badge definitions; stored values override
//! the built-in ones at evaluation time.

use voluntree::config::Config;
use voluntree::db::FirestoreDb;
use voluntree::models::badge::{default_catalog, BadgeDefinition};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = Config::from_env()?;
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let catalog: Vec<BadgeDefinition> = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path, "Importing catalog from file");
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
        None => {
            tracing::info!("Importing built-in catalog");
            default_catalog()
        }
    };

    for badge in &catalog {
        db.upsert_badge_definition(badge).await?;
        tracing::info!(id = %badge.id, xp = badge.xp_reward, "Badge imported");
    }

    tracing::info!(count = catalog.len(), "Catalog import complete");
    Ok(())
}
