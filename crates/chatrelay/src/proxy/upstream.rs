//! Client for the upstream chat-completions API

use axum::http::StatusCode;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result};

use super::error::ProxyError;
use super::request::ChatMessage;

/// Streaming chat-completions request body
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: String,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Issues streaming completion requests to the configured provider
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
    api_key: String,
    endpoint: Url,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, api_key: String) -> Result<Self> {
        let endpoint = completions_endpoint(&config.base_url)?;

        // No overall deadline: it would also bound the streamed body
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
            endpoint,
        })
    }

    /// The fully resolved `chat/completions` URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn completion_request<'a>(&self, messages: &'a [ChatMessage]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: self.config.resolved_model(),
            messages,
            stream: true,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Send a streaming completion request.
    ///
    /// Only a success response is returned; a non-success status is read in
    /// full and surfaced as [`ProxyError::Upstream`] so it never reaches the
    /// transcoder.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<reqwest::Response, ProxyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&self.completion_request(messages))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::Network(format!("Request timed out: {e}"))
                } else if e.is_connect() {
                    ProxyError::Network(format!("Failed to connect to upstream: {e}"))
                } else {
                    ProxyError::Network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body,
            });
        }

        Ok(response)
    }
}

fn completions_endpoint(base_url: &str) -> Result<Url> {
    let joined = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let url = Url::parse(&joined)
        .map_err(|e| RelayError::Config(format!("Invalid upstream base URL '{base_url}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(RelayError::Config(format!(
            "Unsupported URL scheme '{scheme}': only http and https are allowed"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::request::Role;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client =
            UpstreamClient::new(UpstreamConfig::default(), "key".to_string()).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let url = completions_endpoint("http://localhost:8080/v1/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_endpoint_rejects_bad_urls() {
        assert!(completions_endpoint("not a url").is_err());
        assert!(completions_endpoint("ftp://example.com").is_err());
    }

    #[test]
    fn test_completion_request_shape() {
        let config = UpstreamConfig {
            model: "test/model".to_string(),
            temperature: 0.5,
            max_tokens: 42,
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(config, "key".to_string()).unwrap();
        let messages = vec![ChatMessage {
            role: Role::User,
            content: "hi".to_string(),
        }];

        let body = serde_json::to_value(client.completion_request(&messages)).unwrap();

        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 42);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }
}
