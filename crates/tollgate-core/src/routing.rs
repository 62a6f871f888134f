//! Provider routing.
//!
//! Given a prompt, pick one provider from a static catalog by scoring each
//! entry on estimated cost, average latency, reliability and how often the
//! caller has used it before. The catalog is plain data; the scoring code
//! never names a provider.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::usage::{Metadata, Provider};

/// Weight of the cost component.
pub const COST_WEIGHT: f64 = 0.4;

/// Weight of the latency component.
pub const LATENCY_WEIGHT: f64 = 0.3;

/// Weight of the reliability component.
pub const RELIABILITY_WEIGHT: f64 = 0.2;

/// Weight of the caller-preference component.
pub const PREFERENCE_WEIGHT: f64 = 0.1;

/// Estimated cost (USD) at which the cost score reaches zero.
pub const COST_REFERENCE_USD: f64 = 0.1;

/// Latency (ms) at which the latency score reaches zero.
pub const LATENCY_REFERENCE_MS: f64 = 2000.0;

/// How many of the caller's most recent records feed the preference score.
pub const PREFERENCE_HISTORY_LIMIT: usize = 100;

/// Static description of one routable provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderProfile {
    /// Routing key, e.g. `"openai"`.
    pub key: &'static str,

    /// Provider recorded on usage rows routed here.
    pub provider: Provider,

    /// Human-readable name.
    pub display_name: &'static str,

    /// Supported models; the first one is the default.
    pub models: &'static [&'static str],

    /// Base API URL.
    pub base_url: &'static str,

    /// USD per 1,000 prompt tokens.
    pub input_cost_per_1k: f64,

    /// USD per 1,000 completion tokens.
    pub output_cost_per_1k: f64,

    /// Average response latency in milliseconds.
    pub avg_latency_ms: u32,

    /// Reliability in `[0, 1]`.
    pub reliability: f64,

    /// Capability tags.
    pub capabilities: &'static [&'static str],
}

impl ProviderProfile {
    /// Whether this provider serves `model`.
    #[must_use]
    pub fn supports(&self, model: &str) -> bool {
        self.models.iter().any(|m| *m == model)
    }

    /// The provider's default model.
    #[must_use]
    pub fn default_model(&self) -> &'static str {
        self.models.first().copied().unwrap_or_default()
    }

    /// Cost of a call with the given token counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_cost_per_1k
    }
}

/// The compiled-in provider catalog. Declaration order breaks score ties.
pub static PROVIDER_CATALOG: [ProviderProfile; 4] = [
    ProviderProfile {
        key: "openai",
        provider: Provider::OpenAi,
        display_name: "OpenAI",
        models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"],
        base_url: "https://api.openai.com/v1",
        input_cost_per_1k: 0.005,
        output_cost_per_1k: 0.015,
        avg_latency_ms: 800,
        reliability: 0.99,
        capabilities: &["chat", "function-calling", "vision", "json-mode"],
    },
    ProviderProfile {
        key: "anthropic",
        provider: Provider::Anthropic,
        display_name: "Anthropic",
        models: &[
            "claude-3-5-sonnet-20241022",
            "claude-3-opus-20240229",
            "claude-3-haiku-20240307",
        ],
        base_url: "https://api.anthropic.com/v1",
        input_cost_per_1k: 0.003,
        output_cost_per_1k: 0.015,
        avg_latency_ms: 1000,
        reliability: 0.98,
        capabilities: &["chat", "long-context", "vision", "tool-use"],
    },
    ProviderProfile {
        key: "google",
        provider: Provider::Google,
        display_name: "Google",
        models: &["gemini-1.5-pro", "gemini-1.5-flash"],
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        input_cost_per_1k: 0.00125,
        output_cost_per_1k: 0.005,
        avg_latency_ms: 600,
        reliability: 0.97,
        capabilities: &["chat", "long-context", "vision", "multimodal"],
    },
    ProviderProfile {
        key: "mistral",
        provider: Provider::Custom,
        display_name: "Mistral AI",
        models: &["mistral-large-latest", "mistral-medium", "mistral-small"],
        base_url: "https://api.mistral.ai/v1",
        input_cost_per_1k: 0.002,
        output_cost_per_1k: 0.006,
        avg_latency_ms: 700,
        reliability: 0.96,
        capabilities: &["chat", "function-calling", "json-mode"],
    },
];

/// Look up a catalog entry by its routing key.
#[must_use]
pub fn find_profile(key: &str) -> Option<&'static ProviderProfile> {
    PROVIDER_CATALOG.iter().find(|p| p.key == key)
}

/// Look up the catalog entry that serves `model`.
#[must_use]
pub fn profile_for_model(model: &str) -> Option<&'static ProviderProfile> {
    PROVIDER_CATALOG.iter().find(|p| p.supports(model))
}

/// Inbound routing request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Prompt text. Required, must not be blank.
    pub prompt: Option<String>,
    /// Preferred model, honored if the winning provider serves it.
    pub model: Option<String>,
    /// Caller's completion budget, recorded for auditing only.
    pub max_tokens: Option<u32>,
    /// Sampling temperature, recorded for auditing only.
    pub temperature: Option<f64>,
    /// Free-form caller metadata (sanitized before storage).
    pub metadata: Option<serde_json::Value>,
}

/// Score breakdown for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScore {
    /// Routing key of the provider.
    pub provider: &'static str,
    /// `1 - estimated_cost / 0.1`.
    pub cost_score: f64,
    /// `1 - avg_latency_ms / 2000`.
    pub latency_score: f64,
    /// The provider's reliability.
    pub reliability_score: f64,
    /// Share of the caller's recent records that used this provider.
    pub preference_score: f64,
    /// Weighted sum of the four components.
    pub total: f64,
    /// Estimated prompt cost for this provider.
    pub estimated_cost: f64,
}

/// The outcome of routing one prompt.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Identifier of this routing decision.
    pub request_id: String,
    /// Routing key of the chosen provider.
    pub provider: &'static str,
    /// Display name of the chosen provider.
    pub provider_name: &'static str,
    /// Chosen model.
    pub model: String,
    /// Base API URL of the chosen provider.
    pub base_url: &'static str,
    /// Human-readable justification.
    pub rationale: String,
    /// `ceil(prompt chars / 4)`.
    pub estimated_tokens: u64,
    /// Estimated prompt cost at the chosen provider.
    pub estimated_cost: f64,
    /// Chosen provider's average latency.
    pub avg_latency_ms: u32,
    /// Chosen provider's reliability.
    pub reliability: f64,
    /// Scores for every catalog entry, in catalog order.
    pub scores: Vec<ProviderScore>,
    /// Provider value to record on the audit usage row.
    #[serde(skip)]
    pub usage_provider: Provider,
}

impl RoutingDecision {
    /// Metadata stored on the audit usage record for this decision.
    #[must_use]
    pub fn audit_metadata(&self, request: &RouteRequest) -> Metadata {
        let mut meta = crate::usage::sanitize_metadata(request.metadata.as_ref());
        meta.insert("request_id".into(), self.request_id.clone().into());
        meta.insert("rationale".into(), self.rationale.clone().into());
        meta.insert("routed_provider".into(), self.provider.into());
        meta.insert(
            "requested_model".into(),
            request.model.clone().map_or(serde_json::Value::Null, Into::into),
        );
        meta.insert(
            "max_tokens".into(),
            request.max_tokens.map_or(serde_json::Value::Null, Into::into),
        );
        meta.insert(
            "temperature".into(),
            request.temperature.map_or(serde_json::Value::Null, Into::into),
        );
        meta
    }
}

/// Approximate token count: prompt characters divided by four, rounded up.
#[must_use]
pub fn estimate_tokens(prompt: &str) -> u64 {
    let chars = prompt.chars().count() as u64;
    chars.div_ceil(4)
}

/// Share of `history` that used `provider`, 0 for an empty history.
#[allow(clippy::cast_precision_loss)]
fn preference_share(provider: Provider, history: &[Provider]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let hits = history.iter().filter(|p| **p == provider).count();
    hits as f64 / history.len() as f64
}

/// Score every provider in `catalog`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_catalog(
    catalog: &[ProviderProfile],
    estimated_tokens: u64,
    history: &[Provider],
) -> Vec<ProviderScore> {
    catalog
        .iter()
        .map(|profile| {
            let estimated_cost = (estimated_tokens as f64 / 1000.0) * profile.input_cost_per_1k;
            let cost_score = 1.0 - estimated_cost / COST_REFERENCE_USD;
            let latency_score = 1.0 - f64::from(profile.avg_latency_ms) / LATENCY_REFERENCE_MS;
            let reliability_score = profile.reliability;
            let preference_score = preference_share(profile.provider, history);
            let total = COST_WEIGHT * cost_score
                + LATENCY_WEIGHT * latency_score
                + RELIABILITY_WEIGHT * reliability_score
                + PREFERENCE_WEIGHT * preference_score;

            ProviderScore {
                provider: profile.key,
                cost_score,
                latency_score,
                reliability_score,
                preference_score,
                total,
                estimated_cost,
            }
        })
        .collect()
}

/// Index of the best score; the earliest entry wins exact ties.
fn best_index(scores: &[ProviderScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, score) in scores.iter().enumerate() {
        match best {
            Some(b) if scores[b].total >= score.total => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Route a prompt against the built-in catalog.
///
/// `history` is the providers of the caller's most recent usage records,
/// newest first; only the first [`PREFERENCE_HISTORY_LIMIT`] are considered.
///
/// # Errors
///
/// Returns `CoreError::MissingPrompt` if the prompt is absent or blank.
pub fn route(request: &RouteRequest, history: &[Provider]) -> Result<RoutingDecision, CoreError> {
    route_with_catalog(&PROVIDER_CATALOG, request, history)
}

/// Route a prompt against an arbitrary catalog.
///
/// # Errors
///
/// - `CoreError::MissingPrompt` if the prompt is absent or blank.
/// - `CoreError::EmptyCatalog` if `catalog` has no entries.
pub fn route_with_catalog(
    catalog: &[ProviderProfile],
    request: &RouteRequest,
    history: &[Provider],
) -> Result<RoutingDecision, CoreError> {
    let prompt = request
        .prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(CoreError::MissingPrompt)?;

    let history = &history[..history.len().min(PREFERENCE_HISTORY_LIMIT)];
    let estimated_tokens = estimate_tokens(prompt);
    let scores = score_catalog(catalog, estimated_tokens, history);
    let winner = best_index(&scores).ok_or(CoreError::EmptyCatalog)?;
    let profile = &catalog[winner];
    let score = &scores[winner];

    let model = match request.model.as_deref() {
        Some(requested) if profile.supports(requested) => requested.to_string(),
        _ => profile.default_model().to_string(),
    };

    let rationale = format!(
        "Selected {} ({model}): cost score {:.3} (est. ${:.6} for {estimated_tokens} tokens), \
         latency score {:.3} ({}ms avg), reliability {:.3}, user preference {:.3}; total {:.3}",
        profile.display_name,
        score.cost_score,
        score.estimated_cost,
        score.latency_score,
        profile.avg_latency_ms,
        score.reliability_score,
        score.preference_score,
        score.total,
    );

    Ok(RoutingDecision {
        request_id: format!("route_{}", uuid::Uuid::new_v4().simple()),
        provider: profile.key,
        provider_name: profile.display_name,
        model,
        base_url: profile.base_url,
        rationale,
        estimated_tokens,
        estimated_cost: score.estimated_cost,
        avg_latency_ms: profile.avg_latency_ms,
        reliability: profile.reliability,
        usage_provider: profile.provider,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> RouteRequest {
        RouteRequest {
            prompt: Some(prompt.to_string()),
            ..RouteRequest::default()
        }
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // Characters, not bytes.
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn missing_or_blank_prompt_is_rejected() {
        assert_eq!(
            route(&RouteRequest::default(), &[]).unwrap_err(),
            CoreError::MissingPrompt
        );
        assert_eq!(route(&request("   "), &[]).unwrap_err(), CoreError::MissingPrompt);
    }

    #[test]
    fn empty_history_means_zero_preference() {
        let decision = route(&request("hello world"), &[]).unwrap();
        assert_eq!(decision.scores.len(), PROVIDER_CATALOG.len());
        assert!(decision.scores.iter().all(|s| s.preference_score == 0.0));
    }

    #[test]
    fn short_prompt_without_history_prefers_fastest_cheap_provider() {
        let decision = route(&request("Summarize this sentence."), &[]).unwrap();
        assert_eq!(decision.provider, "google");
        assert_eq!(decision.model, "gemini-1.5-pro");
        assert_eq!(decision.base_url, PROVIDER_CATALOG[2].base_url);
    }

    #[test]
    fn estimated_cost_matches_chosen_provider_rate() {
        let prompt = "x".repeat(4001); // 1001 tokens
        let decision = route(&request(&prompt), &[]).unwrap();
        let profile = find_profile(decision.provider).unwrap();

        assert_eq!(decision.estimated_tokens, 1001);
        let expected = (1001.0 / 1000.0) * profile.input_cost_per_1k;
        assert!((decision.estimated_cost - expected).abs() < 1e-12);
    }

    #[test]
    fn strong_history_shifts_the_choice() {
        let history = vec![Provider::OpenAi; 100];
        let decision = route(&request("Summarize this sentence."), &history).unwrap();
        assert_eq!(decision.provider, "openai");

        let openai = &decision.scores[0];
        assert!((openai.preference_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn preference_only_counts_the_latest_hundred_records() {
        let mut history = vec![Provider::Anthropic; 100];
        history.extend(vec![Provider::OpenAi; 50]);
        let decision = route(&request("hi"), &history).unwrap();
        let openai = decision.scores.iter().find(|s| s.provider == "openai").unwrap();
        assert_eq!(openai.preference_score, 0.0);
    }

    #[test]
    fn requested_model_is_kept_when_winner_supports_it() {
        let mut req = request("hi");
        req.model = Some("gemini-1.5-flash".into());
        assert_eq!(route(&req, &[]).unwrap().model, "gemini-1.5-flash");

        req.model = Some("gpt-4o".into());
        let decision = route(&req, &[]).unwrap();
        assert_eq!(decision.provider, "google");
        assert_eq!(decision.model, "gemini-1.5-pro");
    }

    static TIED: [ProviderProfile; 2] = [
        ProviderProfile {
            key: "first",
            provider: Provider::Custom,
            display_name: "First",
            models: &["a"],
            base_url: "https://first.example",
            input_cost_per_1k: 0.001,
            output_cost_per_1k: 0.001,
            avg_latency_ms: 500,
            reliability: 0.9,
            capabilities: &[],
        },
        ProviderProfile {
            key: "second",
            provider: Provider::Custom,
            display_name: "Second",
            models: &["b"],
            base_url: "https://second.example",
            input_cost_per_1k: 0.001,
            output_cost_per_1k: 0.001,
            avg_latency_ms: 500,
            reliability: 0.9,
            capabilities: &[],
        },
    ];

    #[test]
    fn exact_ties_go_to_the_first_listed_provider() {
        let decision = route_with_catalog(&TIED, &request("tie"), &[]).unwrap();
        assert_eq!(decision.scores[0].total, decision.scores[1].total);
        assert_eq!(decision.provider, "first");
    }

    #[test]
    fn rationale_mentions_every_factor() {
        let decision = route(&request("hello"), &[]).unwrap();
        for needle in ["cost score", "latency score", "reliability", "user preference", "total"] {
            assert!(decision.rationale.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn audit_metadata_carries_routing_fields() {
        let mut req = request("hello");
        req.model = Some("gpt-4o".into());
        req.max_tokens = Some(256);
        req.temperature = Some(0.2);
        req.metadata = Some(serde_json::json!({"feature_name": "chat", "secret": "x"}));

        let decision = route(&req, &[]).unwrap();
        let meta = decision.audit_metadata(&req);

        assert_eq!(meta["request_id"], decision.request_id.as_str());
        assert_eq!(meta["requested_model"], "gpt-4o");
        assert_eq!(meta["max_tokens"], 256);
        assert_eq!(meta["temperature"], 0.2);
        assert_eq!(meta["feature_name"], "chat");
        assert!(!meta.contains_key("secret"));
    }

    #[test]
    fn cost_for_uses_both_rates() {
        let p = find_profile("openai").unwrap();
        let cost = p.cost_for(2000, 1000);
        assert!((cost - (2.0 * 0.005 + 0.015)).abs() < 1e-12);
        assert!(profile_for_model("claude-3-haiku-20240307").is_some());
        assert!(profile_for_model("unknown-model").is_none());
    }
}
