// SPDX-License-Identifier: MIT

//! Public referral code endpoints.
//!
//! Both endpoints answer with booleans only. Codes double as credentials,
//! so they must never leak which member owns one.

use crate::error::{AppError, Result};
use crate::services::referral::is_valid_code;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/referral/validate", post(validate_code))
        .route("/api/referral/check-uniqueness", post(check_uniqueness))
}

#[derive(Deserialize, Validate)]
struct CodeRequest {
    #[validate(length(min = 1, max = 16))]
    code: String,
}

#[derive(Serialize)]
struct ValidateCodeResponse {
    valid: bool,
}

/// Existence check used during signup.
async fn validate_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<ValidateCodeResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let valid = state.referral.validate_code(&payload.code).await?;
    Ok(Json(ValidateCodeResponse { valid }))
}

#[derive(Serialize)]
struct UniquenessResponse {
    is_unique: bool,
}

/// Uniqueness probe used by the profile form.
async fn check_uniqueness(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<UniquenessResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if !is_valid_code(&payload.code) {
        return Err(AppError::BadRequest(
            "codes are 5 characters A-Z and 0-9".to_string(),
        ));
    }

    let is_unique = state.referral.is_code_unique(&payload.code).await?;
    Ok(Json(UniquenessResponse { is_unique }))
}
