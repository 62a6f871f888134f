//! Usage analytics handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use tollgate_core::{aggregate, AnalyticsReport, Granularity, Provider};

use crate::auth::ApiCaller;
use crate::error::{ApiError, ApiQuery};
use crate::state::AppState;

/// Default analytics window when no start date is given.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Analytics query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Window start (RFC 3339 or `YYYY-MM-DD`).
    pub start_date: Option<String>,
    /// Window end (RFC 3339 or `YYYY-MM-DD`, whole day included).
    pub end_date: Option<String>,
    /// Restrict to one provider.
    pub provider: Option<String>,
    /// `day`, `week` or `month`.
    pub group_by: Option<String>,
}

/// Parse a date bound. Plain dates expand to the start or the end of the day.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {raw}")))?;
    let time = if end_of_day {
        date.and_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        date.and_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ApiError::BadRequest(format!("invalid date: {raw}")))?;

    Ok(Utc.from_utc_datetime(&time))
}

/// Aggregate the caller's usage over a window.
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let end = match query.end_date.as_deref() {
        Some(raw) => parse_bound(raw, true)?,
        None => Utc::now(),
    };
    let start = match query.start_date.as_deref() {
        Some(raw) => parse_bound(raw, false)?,
        None => end - Duration::days(DEFAULT_WINDOW_DAYS),
    };
    if start > end {
        return Err(ApiError::BadRequest(
            "startDate must not be after endDate".into(),
        ));
    }

    let provider = query
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::parse::<Provider>)
        .transpose()?;
    let granularity = query
        .group_by
        .as_deref()
        .map(str::parse::<Granularity>)
        .transpose()?
        .unwrap_or_default();

    let records = state
        .store
        .usage_between(&caller.user_id, start, end, provider)
        .await?;

    Ok(Json(aggregate(&records, granularity, start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_dates_cover_whole_days() {
        let start = parse_bound("2024-06-01", false).unwrap();
        let end = parse_bound("2024-06-01", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert!(end > start);
        assert_eq!(end.date_naive(), start.date_naive());
    }

    #[test]
    fn rfc3339_is_converted_to_utc() {
        let ts = parse_bound("2024-06-01T02:00:00+02:00", false).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-06-01T00:00:00+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_bound("last tuesday", false),
            Err(ApiError::BadRequest(_))
        ));
    }
}
