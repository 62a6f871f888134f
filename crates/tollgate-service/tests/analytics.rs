//! Analytics endpoint tests.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::TestHarness;

use tollgate_core::{Metadata, Provider, UsageRecord, UserId};
use tollgate_store::Store;

async fn seed(harness: &TestHarness) {
    let rows = [
        (Provider::OpenAi, Some("gpt-4o"), 100, 50, 0.01, (2024, 6, 3)),
        (Provider::OpenAi, Some("gpt-4o"), 200, 100, 0.02, (2024, 6, 3)),
        (Provider::Anthropic, None, 10, 10, 0.05, (2024, 6, 11)),
        (Provider::Google, Some("gemini-1.5-pro"), 1000, 0, 0.001, (2024, 7, 2)),
    ];

    for (provider, model, input, output, cost, (y, m, d)) in rows {
        let record = UsageRecord::new(
            harness.user_id,
            provider,
            model.map(String::from),
            input,
            output,
            cost,
            Metadata::new(),
        )
        .unwrap()
        .at(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap());
        harness.store.insert_usage(&record).await.unwrap();
    }

    // Another user's data never leaks into the report.
    let foreign = UsageRecord::new(
        UserId::generate(),
        Provider::OpenAi,
        None,
        9999,
        9999,
        9.0,
        Metadata::new(),
    )
    .unwrap()
    .at(Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap());
    harness.store.insert_usage(&foreign).await.unwrap();
}

#[tokio::test]
async fn report_totals_and_breakdowns() {
    let harness = TestHarness::new().await;
    seed(&harness).await;

    let response = harness
        .server
        .get("/api/v1/analytics")
        .add_header("authorization", harness.bearer())
        .add_query_param("startDate", "2024-06-01")
        .add_query_param("endDate", "2024-06-30")
        .await;

    response.assert_status_ok();
    let report: serde_json::Value = response.json();

    assert_eq!(report["granularity"], "day");
    assert_eq!(report["totals"]["requests"], 3);
    assert_eq!(report["totals"]["total_tokens"], 470);

    let providers = report["by_provider"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    // Highest cost first.
    assert_eq!(providers[0]["name"], "anthropic");
    assert_eq!(providers[1]["name"], "openai");
    assert_eq!(providers[1]["requests"], 2);

    let models: Vec<&str> = report["by_model"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(models, ["unknown", "gpt-4o"]);

    let periods: Vec<&str> = report["time_series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["period"].as_str().unwrap())
        .collect();
    assert_eq!(periods, ["2024-06-03", "2024-06-11"]);
}

#[tokio::test]
async fn provider_filter_and_monthly_grouping() {
    let harness = TestHarness::new().await;
    seed(&harness).await;

    let report: serde_json::Value = harness
        .server
        .get("/api/v1/analytics")
        .add_header("cookie", harness.session_cookie())
        .add_query_param("startDate", "2024-06-01")
        .add_query_param("endDate", "2024-07-31")
        .add_query_param("provider", "openai")
        .add_query_param("groupBy", "month")
        .await
        .json();

    assert_eq!(report["totals"]["requests"], 2);
    assert_eq!(report["by_provider"].as_array().unwrap().len(), 1);
    assert_eq!(report["time_series"][0]["period"], "2024-06");

    let all: serde_json::Value = harness
        .server
        .get("/api/v1/analytics")
        .add_header("authorization", harness.bearer())
        .add_query_param("startDate", "2024-06-01")
        .add_query_param("endDate", "2024-07-31")
        .add_query_param("groupBy", "month")
        .await
        .json();

    let periods: Vec<&str> = all["time_series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["period"].as_str().unwrap())
        .collect();
    assert_eq!(periods, ["2024-06", "2024-07"]);
}

#[tokio::test]
async fn empty_window_yields_zero_report() {
    let harness = TestHarness::new().await;

    let report: serde_json::Value = harness
        .server
        .get("/api/v1/analytics")
        .add_header("authorization", harness.bearer())
        .await
        .json();

    assert_eq!(report["totals"]["requests"], 0);
    assert!(report["by_provider"].as_array().unwrap().is_empty());
    assert!(report["time_series"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_queries_are_rejected() {
    let harness = TestHarness::new().await;

    let cases = [
        [("groupBy", "fortnight")],
        [("provider", "cohere")],
        [("startDate", "yesterday")],
    ];
    for case in cases {
        harness
            .server
            .get("/api/v1/analytics")
            .add_header("authorization", harness.bearer())
            .add_query_params(case)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    harness
        .server
        .get("/api/v1/analytics")
        .add_header("authorization", harness.bearer())
        .add_query_param("startDate", "2024-07-01")
        .add_query_param("endDate", "2024-06-01")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .server
        .get("/api/v1/analytics")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
