//! Usage analytics.
//!
//! Aggregation runs on demand over whatever records the store returns for
//! a window; nothing is pre-aggregated.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::usage::UsageRecord;

/// Width of a time-series bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One bucket per calendar day (UTC).
    #[default]
    Day,
    /// One bucket per ISO week, labelled by its Monday.
    Week,
    /// One bucket per calendar month.
    Month,
}

impl Granularity {
    fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn label(self, start: NaiveDate) -> String {
        match self {
            Self::Day | Self::Week => start.format("%Y-%m-%d").to_string(),
            Self::Month => start.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            other => Err(CoreError::UnknownGranularity(other.to_string())),
        }
    }
}

/// Running counters over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    /// Number of records.
    pub requests: u64,
    /// Sum of input tokens.
    pub input_tokens: u64,
    /// Sum of output tokens.
    pub output_tokens: u64,
    /// Sum of total tokens.
    pub total_tokens: u64,
    /// Sum of cost in USD.
    pub cost: f64,
}

impl UsageTotals {
    /// Fold one record into the counters. Counters saturate at `u64::MAX`.
    pub fn add(&mut self, record: &UsageRecord) {
        self.requests = self.requests.saturating_add(1);
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(record.total_tokens);
        self.cost += record.cost;
    }

    /// Totals over a slice of records.
    #[must_use]
    pub fn of(records: &[UsageRecord]) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.add(record);
        }
        totals
    }
}

/// Totals for one provider or one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    /// Provider or model name.
    pub name: String,
    /// Counters for this group.
    #[serde(flatten)]
    pub totals: UsageTotals,
}

/// One time-series point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    /// Bucket label (`YYYY-MM-DD` or `YYYY-MM`).
    pub period: String,
    /// Records in the bucket.
    pub requests: u64,
    /// Tokens in the bucket.
    pub total_tokens: u64,
    /// Cost in the bucket.
    pub cost: f64,
}

/// Full analytics response.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
    /// Bucket width of `time_series`.
    pub granularity: Granularity,
    /// Totals over the window.
    pub totals: UsageTotals,
    /// Per-provider totals, most expensive first.
    pub by_provider: Vec<Breakdown>,
    /// Per-model totals, most expensive first.
    pub by_model: Vec<Breakdown>,
    /// Time series, oldest bucket first.
    pub time_series: Vec<TimeBucket>,
}

fn sorted_breakdown(groups: BTreeMap<String, UsageTotals>) -> Vec<Breakdown> {
    let mut out: Vec<Breakdown> = groups
        .into_iter()
        .map(|(name, totals)| Breakdown { name, totals })
        .collect();
    out.sort_by(|a, b| {
        b.totals
            .cost
            .total_cmp(&a.totals.cost)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

/// Aggregate `records` into totals, breakdowns and a time series.
///
/// Records are expected to already be filtered to `[start, end]`.
#[must_use]
pub fn aggregate(
    records: &[UsageRecord],
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AnalyticsReport {
    let mut totals = UsageTotals::default();
    let mut providers: BTreeMap<String, UsageTotals> = BTreeMap::new();
    let mut models: BTreeMap<String, UsageTotals> = BTreeMap::new();
    let mut buckets: BTreeMap<NaiveDate, UsageTotals> = BTreeMap::new();

    for record in records {
        totals.add(record);
        providers
            .entry(record.provider.as_str().to_string())
            .or_default()
            .add(record);
        models
            .entry(record.model.clone().unwrap_or_else(|| "unknown".to_string()))
            .or_default()
            .add(record);
        buckets
            .entry(granularity.bucket_start(record.created_at.date_naive()))
            .or_default()
            .add(record);
    }

    let time_series = buckets
        .into_iter()
        .map(|(start, t)| TimeBucket {
            period: granularity.label(start),
            requests: t.requests,
            total_tokens: t.total_tokens,
            cost: t.cost,
        })
        .collect();

    AnalyticsReport {
        start,
        end,
        granularity,
        totals,
        by_provider: sorted_breakdown(providers),
        by_model: sorted_breakdown(models),
        time_series,
    }
}
