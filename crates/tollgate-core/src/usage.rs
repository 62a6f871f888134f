//! Usage records for tollgate.
//!
//! A usage record is one metering event: which provider served a request,
//! how many tokens went in and out, and what it cost.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{UsageRecordId, UserId};

/// Free-form metadata attached to a usage record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys that survive ingestion. Everything else is dropped.
pub const METADATA_ALLOW_LIST: [&str; 5] = [
    "request_id",
    "session_id",
    "feature_name",
    "environment",
    "version",
];

/// Largest token count a record may carry (the range of a signed BIGINT).
pub const MAX_TOKEN_COUNT: u64 = i64::MAX.unsigned_abs();

/// A single metering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record identifier.
    pub id: UsageRecordId,

    /// The user that owns this record.
    pub user_id: UserId,

    /// Which provider served the request.
    pub provider: Provider,

    /// Model name, if the caller reported one.
    pub model: Option<String>,

    /// Prompt tokens.
    pub input_tokens: u64,

    /// Completion tokens.
    pub output_tokens: u64,

    /// Always `input_tokens + output_tokens`.
    pub total_tokens: u64,

    /// Cost in USD.
    pub cost: f64,

    /// Metadata (sanitized for API-submitted records).
    pub metadata: Metadata,

    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Create a new usage record stamped with the current time.
    ///
    /// `total_tokens` is derived here and cannot be supplied separately.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidCost` if `cost` is negative or not finite.
    /// - `CoreError::TokenOverflow` if `input_tokens + output_tokens` exceeds
    ///   [`MAX_TOKEN_COUNT`].
    pub fn new(
        user_id: UserId,
        provider: Provider,
        model: Option<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost: f64,
        metadata: Metadata,
    ) -> Result<Self, CoreError> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(CoreError::InvalidCost(cost));
        }

        let total_tokens = input_tokens
            .checked_add(output_tokens)
            .filter(|total| *total <= MAX_TOKEN_COUNT)
            .ok_or(CoreError::TokenOverflow)?;

        Ok(Self {
            id: UsageRecordId::generate(),
            user_id,
            provider,
            model,
            input_tokens,
            output_tokens,
            total_tokens,
            cost,
            metadata,
            created_at: Utc::now(),
        })
    }

    /// Override the creation timestamp (used for seeded demo data).
    #[must_use]
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// `OpenAI` (GPT models).
    #[serde(rename = "openai")]
    OpenAi,

    /// Anthropic (Claude models).
    Anthropic,

    /// Google (Gemini models).
    Google,

    /// Anything else, including Mistral and self-hosted vendors. Parses from
    /// `custom` or `mistral`.
    Custom,
}

impl Provider {
    /// All providers, in a stable order.
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Custom,
    ];

    /// Get the provider name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            "custom" | "mistral" => Ok(Self::Custom),
            other => Err(CoreError::UnknownProvider(other.to_string())),
        }
    }
}

/// Keep only allow-listed metadata keys.
///
/// Non-object input yields an empty map.
#[must_use]
pub fn sanitize_metadata(raw: Option<&serde_json::Value>) -> Metadata {
    let Some(serde_json::Value::Object(map)) = raw else {
        return Metadata::new();
    };

    map.iter()
        .filter(|(key, _)| METADATA_ALLOW_LIST.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_tokens_is_sum_of_input_and_output() {
        let record = UsageRecord::new(
            UserId::generate(),
            Provider::Anthropic,
            Some("claude-3-haiku".into()),
            1200,
            345,
            0.01,
            Metadata::new(),
        )
        .unwrap();

        assert_eq!(record.total_tokens, 1545);
    }

    #[test]
    fn negative_cost_is_rejected() {
        let err = UsageRecord::new(
            UserId::generate(),
            Provider::OpenAi,
            None,
            1,
            1,
            -0.5,
            Metadata::new(),
        )
        .unwrap_err();

        assert_eq!(err, CoreError::InvalidCost(-0.5));
    }

    #[test]
    fn token_counts_beyond_bigint_are_rejected() {
        let record = |input, output| {
            UsageRecord::new(
                UserId::generate(),
                Provider::OpenAi,
                None,
                input,
                output,
                0.0,
                Metadata::new(),
            )
        };

        assert_eq!(record(u64::MAX, 1).unwrap_err(), CoreError::TokenOverflow);
        assert_eq!(
            record(MAX_TOKEN_COUNT, 1).unwrap_err(),
            CoreError::TokenOverflow
        );
        assert_eq!(
            record(MAX_TOKEN_COUNT - 1, 1).unwrap().total_tokens,
            MAX_TOKEN_COUNT
        );
    }

    #[test]
    fn sanitize_drops_unknown_keys() {
        let raw = json!({
            "request_id": "req_1",
            "session_id": "sess_1",
            "feature_name": "chat",
            "environment": "prod",
            "version": "1.2.0",
            "user_email": "leak@example.com",
            "api_key": "sk-123"
        });

        let clean = sanitize_metadata(Some(&raw));

        assert_eq!(clean.len(), 5);
        assert!(!clean.contains_key("user_email"));
        assert!(!clean.contains_key("api_key"));
        assert_eq!(clean["request_id"], "req_1");
    }

    #[test]
    fn sanitize_non_object_is_empty() {
        assert!(sanitize_metadata(Some(&json!("text"))).is_empty());
        assert!(sanitize_metadata(None).is_empty());
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" google ".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("Mistral".parse::<Provider>().unwrap(), Provider::Custom);
        assert!(matches!(
            "cohere".parse::<Provider>(),
            Err(CoreError::UnknownProvider(_))
        ));
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Provider::OpenAi).unwrap(), "openai");
        assert_eq!(serde_json::to_value(Provider::Custom).unwrap(), "custom");
    }
}
