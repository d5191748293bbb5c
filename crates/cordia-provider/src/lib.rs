// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementation of the LLM provider contract.
//!
//! Targets the Anthropic Messages API wire format. The core only hands over
//! prompts and reads back text plus token counts; the provider (model, base
//! URL, key) is configuration.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use cordia_config::model::ProviderConfig;
use cordia_core::error::CordiaError;
use cordia_core::traits::{PluginAdapter, ProviderAdapter};
use cordia_core::types::{AdapterType, Generation, HealthStatus};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// HTTP provider adapter over the Messages API.
///
/// Calls block up to the configured hard timeout and retry on transient
/// failures (timeout, 429, 5xx) with jittered backoff.
pub struct HttpProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Requires `provider.api_key`.
    pub fn new(config: ProviderConfig) -> Result<Self, CordiaError> {
        let api_key = config.api_key.as_deref().unwrap_or_default();
        if api_key.is_empty() {
            return Err(CordiaError::Config(
                "provider.api_key is required for the HTTP provider".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| CordiaError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CordiaError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    async fn call_once(&self, system: &str, user: &str) -> Result<Generation, CordiaError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });
        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CordiaError::Timeout {
                        duration: Duration::from_secs(self.config.timeout_secs),
                    }
                } else {
                    CordiaError::Provider {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CordiaError::QuotaExceeded(
                body.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("rate limited")
                    .to_string(),
            ));
        }
        if !status.is_success() {
            return Err(CordiaError::Provider {
                message: format!(
                    "messages API returned {status}: {}",
                    body.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error")
                ),
                source: None,
            });
        }

        let text = body
            .pointer("/content/0/text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        let tokens_in = body
            .pointer("/usage/input_tokens")
            .and_then(|t| t.as_u64())
            .unwrap_or(0) as u32;
        let tokens_out = body
            .pointer("/usage/output_tokens")
            .and_then(|t| t.as_u64())
            .unwrap_or(0) as u32;
        debug!(tokens_in, tokens_out, "generation complete");
        Ok(Generation {
            text,
            tokens_in,
            tokens_out,
        })
    }

    fn is_transient(error: &CordiaError) -> bool {
        matches!(
            error,
            CordiaError::Timeout { .. } | CordiaError::QuotaExceeded(_)
        ) || matches!(error, CordiaError::Provider { message, .. } if message.contains("500")
            || message.contains("502")
            || message.contains("503")
            || message.contains("529"))
    }
}

#[async_trait]
impl PluginAdapter for HttpProvider {
    fn name(&self) -> &str {
        "http-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Generation, CordiaError> {
        let mut attempt = 0;
        loop {
            match self.call_once(system_prompt, user_prompt).await {
                Ok(generation) => return Ok(generation),
                Err(e) if attempt < self.config.max_retries && Self::is_transient(&e) => {
                    let jitter_ms = rand::thread_rng().gen_range(200..800u64) * (1u64 << attempt);
                    warn!(attempt, jitter_ms, error = %e, "transient provider error, retrying");
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            base_url,
            api_key: Some("sk-test".into()),
            model: "claude-haiku-4-5-20250901".into(),
            timeout_secs: 2,
            max_retries: 1,
        }
    }

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "content": [{ "type": "text", "text": "summary text" }],
            "usage": { "input_tokens": 42, "output_tokens": 7 },
        })
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = HttpProvider::new(ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, CordiaError::Config(_)));
    }

    #[tokio::test]
    async fn generate_posts_prompts_and_reads_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(body_partial_json(serde_json::json!({
                "system": "you summarize",
                "messages": [{ "role": "user", "content": "the transcript" }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(config(server.uri())).unwrap();
        let generation = provider.generate("you summarize", "the transcript").await.unwrap();
        assert_eq!(generation.text, "summary text");
        assert_eq!(generation.tokens_in, 42);
        assert_eq!(generation.tokens_out, 7);
    }

    #[tokio::test]
    async fn transient_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(config(server.uri())).unwrap();
        let generation = provider.generate("s", "u").await.unwrap();
        assert_eq!(generation.text, "summary text");
    }

    #[tokio::test]
    async fn quota_errors_surface_unchanged_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "monthly quota exhausted" },
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(config(server.uri())).unwrap();
        let err = provider.generate("s", "u").await.unwrap_err();
        match err {
            CordiaError::QuotaExceeded(reason) => assert!(reason.contains("quota")),
            other => panic!("expected quota error, got {other:?}"),
        }
    }
}
