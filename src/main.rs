// SPDX-License-Identifier: MIT

//! Voluntree API Server
//!
//! Backend for the volunteer-engagement platform: QR participation
//! validation, XP and badges, notifications, and activity management for
//! non-profit organizations.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voluntree::{
    config::Config,
    db::FirestoreDb,
    services::{
        ActivityService, BadgeEngine, NotificationService, OidcVerifier, PushService,
        ReferralService, TasksService, ValidationEngine,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Voluntree API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize Cloud Tasks service
    let tasks = TasksService::new(&config.gcp_project_id, &config.gcp_region);
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks service initialized"
    );

    // Push delivery + notification dispatch
    let push = PushService::new(&config.push_service_credentials);
    let notifier = NotificationService::new(db.clone(), push, &config.app_url);

    // Gamification engines
    let badges = BadgeEngine::new(db.clone(), notifier.clone());
    let validation = ValidationEngine::new(db.clone(), badges.clone(), notifier.clone());
    let activities = ActivityService::new(db.clone(), notifier.clone());
    let referral = ReferralService::new(db.clone());

    let oidc_verifier =
        Arc::new(OidcVerifier::new(&config).expect("Failed to initialize OIDC verifier"));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        tasks,
        notifier,
        badges,
        validation,
        activities,
        referral,
        oidc_verifier,
    });

    // Build router
    let app = voluntree::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voluntree=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
