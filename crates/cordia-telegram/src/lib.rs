// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter over the Bot API.
//!
//! Webhook updates arrive as `Update.message` for direct chats or
//! `Update.channel_post` for channels; both shapes are tolerated, with the
//! fallback logged. The chat id is the channel-scoped sender identifier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use cordia_config::model::TelegramConfig;
use cordia_core::error::CordiaError;
use cordia_core::traits::{ChannelAdapter, PluginAdapter};
use cordia_core::types::{
    AdapterType, ChannelCapabilities, ChannelType, HealthStatus, MessageContent,
    OutboundEnvelope, SendReceipt, StandardMessage,
};

const BOT_API_BASE: &str = "https://api.telegram.org";

/// Telegram adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
}

impl TelegramChannel {
    /// Requires `telegram.bot_token`.
    pub fn new(config: TelegramConfig) -> Result<Self, CordiaError> {
        if config.bot_token.as_deref().unwrap_or_default().is_empty() {
            return Err(CordiaError::Config(
                "telegram.bot_token is required for the Telegram adapter".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CordiaError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            config,
            client,
            base_url: BOT_API_BASE.to_string(),
        })
    }

    /// Point the adapter at a different API base. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self, call: &str) -> String {
        format!(
            "{}/bot{}/{call}",
            self.base_url,
            self.config.bot_token.as_deref().unwrap_or_default()
        )
    }

    /// Extract from a message-like object (`message` or `channel_post`).
    fn from_message_object(raw: &serde_json::Value, message: &serde_json::Value) -> Option<StandardMessage> {
        let chat_id = message.pointer("/chat/id")?.as_i64()?;
        let display_name = message
            .pointer("/from/username")
            .or_else(|| message.pointer("/from/first_name"))
            .or_else(|| message.pointer("/chat/title"))
            .and_then(|n| n.as_str())
            .map(str::to_string);
        let received_at = message
            .get("date")
            .and_then(|d| d.as_i64())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        let content = if let Some(text) = message.get("text").and_then(|t| t.as_str()) {
            MessageContent::Text {
                body: text.to_string(),
            }
        } else if let Some(photos) = message.get("photo").and_then(|p| p.as_array()) {
            MessageContent::Media {
                url: photos.last()?.get("file_id")?.as_str()?.to_string(),
                mime_type: Some("image/jpeg".into()),
                caption: message.get("caption").and_then(|c| c.as_str()).map(str::to_string),
            }
        } else {
            return None;
        };

        Some(StandardMessage {
            channel: ChannelType::Telegram,
            sender_identifier: chat_id.to_string(),
            sender_display_name: display_name,
            content,
            received_at,
            channel_metadata: raw.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        let response = self.client.get(self.api_url("getMe")).send().await;
        match response {
            Ok(r) if r.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(r) => Ok(HealthStatus::Unhealthy(format!("getMe returned {}", r.status()))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("bot API unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn channel(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_text: true,
            supports_media: true,
            supports_templates: false,
            max_message_length: Some(4096),
            quiet_hours_honored: true,
            rate_limit_per_minute: 30,
        }
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<StandardMessage, CordiaError> {
        if let Some(message) = raw.get("message").and_then(|m| Self::from_message_object(raw, m)) {
            return Ok(message);
        }
        if let Some(post) = raw
            .get("channel_post")
            .and_then(|m| Self::from_message_object(raw, m))
        {
            warn!("update carried no message, parsed channel_post payload");
            return Ok(post);
        }
        Err(CordiaError::UnparseablePayload {
            channel: "telegram".into(),
            detail: "update carried neither message nor channel_post".into(),
        })
    }

    async fn send(
        &self,
        recipient: &str,
        envelope: &OutboundEnvelope,
    ) -> Result<SendReceipt, CordiaError> {
        let (call, body) = match &envelope.content {
            MessageContent::Text { body } => (
                "sendMessage",
                serde_json::json!({ "chat_id": recipient, "text": body }),
            ),
            MessageContent::Media { url, caption, .. } => (
                "sendPhoto",
                serde_json::json!({ "chat_id": recipient, "photo": url, "caption": caption }),
            ),
            MessageContent::Template { .. } => {
                return Err(CordiaError::ChannelRejected {
                    channel: "telegram".into(),
                    reason: "templates are not supported on Telegram".into(),
                });
            }
        };

        let response = self
            .client
            .post(self.api_url(call))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CordiaError::ChannelTimeout {
                        channel: "telegram".into(),
                        duration: std::time::Duration::from_secs(self.config.timeout_secs),
                    }
                } else {
                    CordiaError::ChannelUnavailable {
                        channel: "telegram".into(),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if status.is_success() && body.get("ok").and_then(|o| o.as_bool()) == Some(true) {
            let vendor_message_id = body
                .pointer("/result/message_id")
                .and_then(|id| id.as_i64())
                .map(|id| id.to_string());
            debug!(recipient, ?vendor_message_id, "telegram send accepted");
            return Ok(SendReceipt {
                accepted: true,
                vendor_message_id,
            });
        }
        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            let reason = body
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("request rejected")
                .to_string();
            return Err(CordiaError::ChannelRejected {
                channel: "telegram".into(),
                reason,
            });
        }
        Err(CordiaError::ChannelUnavailable {
            channel: "telegram".into(),
            source: Some(format!("bot API returned {status}").into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter() -> TelegramChannel {
        TelegramChannel::new(TelegramConfig {
            bot_token: Some("123:abc".into()),
            timeout_secs: 2,
        })
        .unwrap()
    }

    fn update_with_message(text: &str) -> serde_json::Value {
        serde_json::json!({
            "update_id": 7,
            "message": {
                "message_id": 5,
                "from": { "id": 42, "first_name": "Maria", "username": "maria_sales" },
                "chat": { "id": 42, "type": "private" },
                "date": 1767225600,
                "text": text,
            },
        })
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = TelegramChannel::new(TelegramConfig::default()).unwrap_err();
        assert!(matches!(err, CordiaError::Config(_)));
    }

    #[test]
    fn normalizes_message_updates() {
        let message = adapter().normalize(&update_with_message("Hi there")).unwrap();
        assert_eq!(message.sender_identifier, "42");
        assert_eq!(message.sender_display_name.as_deref(), Some("maria_sales"));
        assert_eq!(message.content.as_text(), "Hi there");
    }

    #[test]
    #[traced_test]
    fn falls_back_to_channel_post() {
        let payload = serde_json::json!({
            "update_id": 8,
            "channel_post": {
                "message_id": 9,
                "chat": { "id": -100123, "type": "channel", "title": "Deals" },
                "date": 1767225600,
                "text": "New offer",
            },
        });
        let message = adapter().normalize(&payload).unwrap();
        assert_eq!(message.sender_identifier, "-100123");
        assert_eq!(message.sender_display_name.as_deref(), Some("Deals"));
        assert!(logs_contain("parsed channel_post payload"));
    }

    #[test]
    fn unknown_update_is_unparseable() {
        let err = adapter()
            .normalize(&serde_json::json!({ "update_id": 9, "poll": {} }))
            .unwrap_err();
        assert!(matches!(err, CordiaError::UnparseablePayload { .. }));
    }

    #[tokio::test]
    async fn send_uses_send_message_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({ "chat_id": "42" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 77 },
            })))
            .mount(&server)
            .await;

        let adapter = adapter().with_base_url(server.uri());
        let receipt = adapter
            .send(
                "42",
                &OutboundEnvelope {
                    recipient: "42".into(),
                    content: MessageContent::Text { body: "Hallo!".into() },
                },
            )
            .await
            .unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.vendor_message_id.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn blocked_bot_maps_to_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user",
            })))
            .mount(&server)
            .await;

        let adapter = adapter().with_base_url(server.uri());
        let err = adapter
            .send(
                "42",
                &OutboundEnvelope {
                    recipient: "42".into(),
                    content: MessageContent::Text { body: "Hallo!".into() },
                },
            )
            .await
            .unwrap_err();
        match err {
            CordiaError::ChannelRejected { reason, .. } => {
                assert!(reason.contains("blocked by the user"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn templates_are_rejected_locally() {
        let err = adapter()
            .send(
                "42",
                &OutboundEnvelope {
                    recipient: "42".into(),
                    content: MessageContent::Template {
                        key: "intro".into(),
                        variables: Default::default(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CordiaError::ChannelRejected { .. }));
    }
}
