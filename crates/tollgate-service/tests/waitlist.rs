//! Waitlist and admin listing tests.

mod common;

use axum::http::StatusCode;
use common::{TestHarness, ADMIN_KEY};
use serde_json::json;

// ============================================================================
// Signup
// ============================================================================

#[tokio::test]
async fn signup_then_duplicate_conflicts() {
    let harness = TestHarness::new().await;

    let first = harness
        .server
        .post("/api/waitlist")
        .json(&json!({ "email": "  Early@Bird.io " }))
        .await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["success"], true);

    let second = harness
        .server
        .post("/api/waitlist")
        .json(&json!({ "email": "early@bird.io" }))
        .await;
    second.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = second.json();
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(body["error"]["message"], "already on waitlist");

    let count = harness.server.get("/api/waitlist/count").await;
    count.assert_status_ok();
    let body: serde_json::Value = count.json();
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn malformed_email_is_rejected() {
    let harness = TestHarness::new().await;

    for email in ["not-an-email", "a@b", "two words@x.io", ""] {
        harness
            .server
            .post("/api/waitlist")
            .json(&json!({ "email": email }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    harness
        .server
        .post("/api/waitlist")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/api/waitlist")
        .content_type("application/json")
        .text("{not json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_outage_is_internal_error() {
    let harness = TestHarness::new().await;
    harness.store.set_unavailable(true);

    let response = harness
        .server
        .post("/api/waitlist")
        .json(&json!({ "email": "late@bird.io" }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "internal_error");
    assert_eq!(body["error"]["message"], "An internal error occurred");
}

// ============================================================================
// Admin listing
// ============================================================================

#[tokio::test]
async fn admin_lists_signups_with_total() {
    let harness = TestHarness::new().await;

    for email in ["a@x.io", "b@x.io", "c@x.io"] {
        harness
            .server
            .post("/api/waitlist")
            .json(&json!({ "email": email }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/api/admin/waitlist")
        .add_query_param("limit", 2)
        .add_header("x-admin-key", ADMIN_KEY)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_listing_requires_admin_key() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/api/admin/waitlist")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/api/admin/waitlist")
        .add_header("x-admin-key", "wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
