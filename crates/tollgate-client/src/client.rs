//! Tollgate HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use tollgate_core::WebhookId;

use crate::error::ClientError;
use crate::types::{
    AnalyticsQuery, AnalyticsReport, ApiErrorResponse, DeliveryLog, RouteDecision, RouteOptions,
    TrackEvent, TrackResponse, Webhook, WebhookList, WebhookRegistration,
};

/// Tollgate public API client.
///
/// Authenticates every request with a bearer API key.
#[derive(Debug, Clone)]
pub struct TollgateClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TollgateClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"https://tollgate.example.com"`)
    /// * `api_key` - API key issued from the dashboard
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the key is blank or the HTTP
    /// client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the key is blank or the HTTP
    /// client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::Configuration("API key must not be empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Record one usage event.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn track(&self, event: &TrackEvent) -> Result<TrackResponse, ClientError> {
        let url = format!("{}/api/v1/track", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(event)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Ask the service which provider should serve a prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn route(&self, options: &RouteOptions) -> Result<RouteDecision, ClientError> {
        let url = format!("{}/api/v1/route", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(options)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Fetch aggregated usage.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn analytics(&self, query: &AnalyticsQuery) -> Result<AnalyticsReport, ClientError> {
        let url = format!("{}/api/v1/analytics", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Register a webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn register_webhook(
        &self,
        registration: &WebhookRegistration,
    ) -> Result<Webhook, ClientError> {
        let url = format!("{}/api/v1/webhooks", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(registration)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List registered webhooks, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>, ClientError> {
        let url = format!("{}/api/v1/webhooks", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let list: WebhookList = self.handle_response(response).await?;
        Ok(list.webhooks)
    }

    /// Fetch the delivery log of one webhook.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` for unknown or foreign webhooks, or
    /// another error if the request fails.
    pub async fn webhook_deliveries(
        &self,
        webhook_id: WebhookId,
        limit: Option<usize>,
    ) -> Result<DeliveryLog, ClientError> {
        let url = format!("{}/api/v1/webhooks/{webhook_id}/deliveries", self.base_url);

        let mut request = self.client.get(&url).bearer_auth(&self.api_key);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code;
                let message = api_error.error.message;
                tracing::debug!(status = status.as_u16(), code = %code, "Tollgate API error");

                match code.as_str() {
                    "not_found" => Err(ClientError::NotFound(message)),
                    _ => Err(ClientError::Api {
                        code,
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = TollgateClient::new("http://localhost:8080", "tg_key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = TollgateClient::new("http://localhost:8080/", "tg_key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            TollgateClient::new("http://localhost:8080", "  "),
            Err(ClientError::Configuration(_))
        ));
    }
}
