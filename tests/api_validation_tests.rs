// SPDX-License-Identifier: MIT

//! API input validation tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn json_request(method: &str, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn empty_qr_token_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("m1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/activities/a1/validate",
            &token,
            r#"{"qr_token": ""}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_qr_token_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("m1", &state.config.jwt_signing_key);

    let long_token = "x".repeat(129);
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/activities/a1/validate",
            &token,
            &format!(r#"{{"qr_token": "{long_token}"}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn referral_code_validation_rejects_oversized_input() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/referral/validate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(r#"{{"code": "{}"}}"#, "A".repeat(100))))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uniqueness_check_rejects_malformed_codes() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/referral/check-uniqueness")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"code": "ab1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_cadence_is_a_bad_request() {
    let (app, state) = common::create_test_app();
    // Org manager claim lets the request reach recurrence parsing
    let token = common::create_org_jwt("manager", "o1", &state.config.jwt_signing_key);

    let body = r#"{
        "title": "Weekly cleanup",
        "type": "local",
        "category": "environment",
        "frequency": "regular",
        "start_date": "2025-03-03",
        "end_date": "2025-03-03",
        "status": "Open",
        "recurrence": {
            "cadence": "fortnightly",
            "recurrence_days": [1],
            "end_type": "occurrences",
            "occurrences": 4
        }
    }"#;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/organizations/o1/activities",
            &token,
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn activity_creation_requires_manager_claim() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("m1", &state.config.jwt_signing_key);

    let body = r#"{
        "title": "Weekly cleanup",
        "type": "local",
        "category": "environment",
        "frequency": "regular",
        "start_date": "2025-03-03",
        "end_date": "2025-03-03",
        "status": "Open"
    }"#;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/organizations/o1/activities",
            &token,
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn oversized_idea_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("m1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/ideas",
            &token,
            &format!(r#"{{"text": "{}"}}"#, "i".repeat(2001)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancelling_someone_elses_application_is_forbidden() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("m1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(json_request(
            "PATCH",
            "/api/activities/a1/applications/other-member",
            &token,
            r#"{"status": "cancelled"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
