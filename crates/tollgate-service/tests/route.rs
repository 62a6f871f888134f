//! Provider routing tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;

use tollgate_core::{Metadata, Provider, UsageRecord};
use tollgate_store::Store;

#[tokio::test]
async fn route_requires_credentials() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/api/v1/route")
        .json(&json!({ "prompt": "hi" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_prompt_is_rejected() {
    let harness = TestHarness::new().await;

    for body in [json!({}), json!({ "prompt": "   " })] {
        harness
            .server
            .post("/api/v1/route")
            .add_header("authorization", harness.bearer())
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    assert!(harness.store.recent_usage(&harness.user_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn decision_is_returned_and_audited() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/v1/route")
        .add_header("authorization", harness.bearer())
        .json(&json!({
            "prompt": "Summarize this sentence.",
            "maxTokens": 256,
            "temperature": 0.2,
            "metadata": { "feature_name": "summaries", "secret": "drop-me" }
        }))
        .await;

    response.assert_status_ok();
    let decision: serde_json::Value = response.json();
    assert_eq!(decision["provider"], "google");
    assert_eq!(decision["model"], "gemini-1.5-pro");
    assert_eq!(decision["estimated_tokens"], 6);
    assert_eq!(decision["scores"].as_array().unwrap().len(), 4);
    assert!(decision["rationale"].as_str().unwrap().contains("Google"));

    let records = harness.store.recent_usage(&harness.user_id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    let audit = &records[0];
    assert_eq!(audit.provider, Provider::Google);
    assert_eq!(audit.model.as_deref(), Some("gemini-1.5-pro"));
    assert_eq!(audit.input_tokens, 6);
    assert_eq!(audit.output_tokens, 0);
    assert_eq!(audit.metadata["request_id"], decision["request_id"]);
    assert_eq!(audit.metadata["feature_name"], "summaries");
    assert_eq!(audit.metadata["max_tokens"], 256);
    assert!(!audit.metadata.contains_key("secret"));
}

#[tokio::test]
async fn requested_model_is_kept_only_when_supported() {
    let harness = TestHarness::new().await;

    let supported: serde_json::Value = harness
        .server
        .post("/api/v1/route")
        .add_header("authorization", harness.bearer())
        .json(&json!({ "prompt": "hello", "model": "gemini-1.5-flash" }))
        .await
        .json();
    assert_eq!(supported["model"], "gemini-1.5-flash");

    let unsupported: serde_json::Value = harness
        .server
        .post("/api/v1/route")
        .add_header("authorization", harness.bearer())
        .json(&json!({ "prompt": "hello", "model": "gpt-4o" }))
        .await
        .json();
    assert_eq!(unsupported["provider"], "google");
    assert_eq!(unsupported["model"], "gemini-1.5-pro");
}

#[tokio::test]
async fn usage_history_shifts_the_choice() {
    let harness = TestHarness::new().await;

    for _ in 0..10 {
        let record = UsageRecord::new(
            harness.user_id,
            Provider::Anthropic,
            Some("claude-3-haiku-20240307".into()),
            100,
            100,
            0.001,
            Metadata::new(),
        )
        .unwrap();
        harness.store.insert_usage(&record).await.unwrap();
    }

    let decision: serde_json::Value = harness
        .server
        .post("/api/v1/route")
        .add_header("authorization", harness.bearer())
        .json(&json!({ "prompt": "Summarize this sentence." }))
        .await
        .json();

    assert_eq!(decision["provider"], "anthropic");
    let anthropic = decision["scores"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["provider"] == "anthropic")
        .unwrap();
    assert_eq!(anthropic["preference_score"], 1.0);
}

#[tokio::test]
async fn audit_failure_does_not_block_decision() {
    let harness = TestHarness::new().await;
    harness.store.set_unavailable(true);

    let response = harness
        .server
        .post("/api/v1/route")
        .add_header("cookie", harness.session_cookie())
        .json(&json!({ "prompt": "Still routable while storage is down" }))
        .await;

    response.assert_status_ok();
    let decision: serde_json::Value = response.json();
    assert!(decision["request_id"].as_str().unwrap().starts_with("route_"));

    harness.store.set_unavailable(false);
    assert!(harness.store.recent_usage(&harness.user_id, 10).await.unwrap().is_empty());
}
