// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel adapter over the Meta Cloud API.
//!
//! Normalization tolerates the two payload shapes seen in the wild: the
//! current Cloud API webhook (`entry[].changes[].value.messages[]`) and the
//! legacy form-style relay (`From`/`Body`/`MessageSid`). The fallback is
//! logged and the raw payload is preserved in `channel_metadata`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use cordia_config::model::WhatsappConfig;
use cordia_core::error::CordiaError;
use cordia_core::traits::{ChannelAdapter, PluginAdapter};
use cordia_core::types::{
    AdapterType, ChannelCapabilities, ChannelType, HealthStatus, MessageContent,
    OutboundEnvelope, SendReceipt, StandardMessage,
};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// WhatsApp adapter implementing [`ChannelAdapter`].
///
/// Stateless apart from the configured access token; every send is a plain
/// HTTPS POST against the Graph API with the configured hard timeout.
pub struct WhatsappChannel {
    config: WhatsappConfig,
    client: reqwest::Client,
    base_url: String,
}

impl WhatsappChannel {
    /// Requires `whatsapp.access_token` and `whatsapp.phone_number_id`.
    pub fn new(config: WhatsappConfig) -> Result<Self, CordiaError> {
        let token = config.access_token.as_deref().unwrap_or_default();
        if token.is_empty() {
            return Err(CordiaError::Config(
                "whatsapp.access_token is required for the WhatsApp adapter".into(),
            ));
        }
        if config.phone_number_id.as_deref().unwrap_or_default().is_empty() {
            return Err(CordiaError::Config(
                "whatsapp.phone_number_id is required for the WhatsApp adapter".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CordiaError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            config,
            client,
            base_url: GRAPH_API_BASE.to_string(),
        })
    }

    /// Point the adapter at a different API base. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Current Cloud API webhook shape.
    fn normalize_cloud_api(raw: &serde_json::Value) -> Option<StandardMessage> {
        let value = raw.get("entry")?.get(0)?.get("changes")?.get(0)?.get("value")?;
        let message = value.get("messages")?.get(0)?;
        let sender = message.get("from")?.as_str()?.to_string();
        let display_name = value
            .get("contacts")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/profile/name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);
        let received_at = message
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        let content = match message.get("type").and_then(|t| t.as_str()) {
            Some("text") => MessageContent::Text {
                body: message.pointer("/text/body")?.as_str()?.to_string(),
            },
            Some(kind @ ("image" | "video" | "audio" | "document")) => {
                let media = message.get(kind)?;
                MessageContent::Media {
                    url: media.get("id")?.as_str()?.to_string(),
                    mime_type: media.get("mime_type").and_then(|m| m.as_str()).map(str::to_string),
                    caption: media.get("caption").and_then(|c| c.as_str()).map(str::to_string),
                }
            }
            _ => return None,
        };

        Some(StandardMessage {
            channel: ChannelType::Whatsapp,
            sender_identifier: sender,
            sender_display_name: display_name,
            content,
            received_at,
            channel_metadata: raw.clone(),
        })
    }

    /// Legacy form-style relay shape.
    fn normalize_legacy(raw: &serde_json::Value) -> Option<StandardMessage> {
        let from = raw.get("From")?.as_str()?;
        let body = raw.get("Body")?.as_str()?.to_string();
        Some(StandardMessage {
            channel: ChannelType::Whatsapp,
            sender_identifier: from.strip_prefix("whatsapp:").unwrap_or(from).to_string(),
            sender_display_name: raw
                .get("ProfileName")
                .and_then(|n| n.as_str())
                .map(str::to_string),
            content: MessageContent::Text { body },
            received_at: Utc::now(),
            channel_metadata: raw.clone(),
        })
    }

    fn outbound_body(&self, recipient: &str, envelope: &OutboundEnvelope) -> serde_json::Value {
        match &envelope.content {
            MessageContent::Text { body } => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "text",
                "text": { "body": body },
            }),
            MessageContent::Media { url, caption, .. } => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "image",
                "image": { "link": url, "caption": caption },
            }),
            MessageContent::Template { key, variables } => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": recipient,
                "type": "template",
                "template": {
                    "name": key,
                    "language": { "code": "de" },
                    "components": [{
                        "type": "body",
                        "parameters": variables.values()
                            .map(|v| serde_json::json!({ "type": "text", "text": v }))
                            .collect::<Vec<_>>(),
                    }],
                },
            }),
        }
    }
}

#[async_trait]
impl PluginAdapter for WhatsappChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        // Token validity only shows on a real send; config presence is the
        // meaningful local check.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsappChannel {
    fn channel(&self) -> ChannelType {
        ChannelType::Whatsapp
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_text: true,
            supports_media: true,
            supports_templates: true,
            max_message_length: Some(4096),
            quiet_hours_honored: true,
            rate_limit_per_minute: 60,
        }
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<StandardMessage, CordiaError> {
        if let Some(message) = Self::normalize_cloud_api(raw) {
            return Ok(message);
        }
        if let Some(message) = Self::normalize_legacy(raw) {
            warn!("cloud API shape did not match, parsed legacy form payload");
            return Ok(message);
        }
        Err(CordiaError::UnparseablePayload {
            channel: "whatsapp".into(),
            detail: "neither cloud API nor legacy form shape matched".into(),
        })
    }

    async fn send(
        &self,
        recipient: &str,
        envelope: &OutboundEnvelope,
    ) -> Result<SendReceipt, CordiaError> {
        let phone_number_id = self.config.phone_number_id.as_deref().unwrap_or_default();
        let url = format!("{}/{}/messages", self.base_url, phone_number_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.access_token.as_deref().unwrap_or_default())
            .json(&self.outbound_body(recipient, envelope))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CordiaError::ChannelTimeout {
                        channel: "whatsapp".into(),
                        duration: std::time::Duration::from_secs(self.config.timeout_secs),
                    }
                } else {
                    CordiaError::ChannelUnavailable {
                        channel: "whatsapp".into(),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if status.is_success() {
            let vendor_message_id = body
                .pointer("/messages/0/id")
                .and_then(|id| id.as_str())
                .map(str::to_string);
            debug!(recipient, ?vendor_message_id, "whatsapp send accepted");
            return Ok(SendReceipt {
                accepted: true,
                vendor_message_id,
            });
        }
        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            let reason = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("request rejected")
                .to_string();
            return Err(CordiaError::ChannelRejected {
                channel: "whatsapp".into(),
                reason,
            });
        }
        Err(CordiaError::ChannelUnavailable {
            channel: "whatsapp".into(),
            source: Some(format!("graph API returned {status}").into()),
        })
    }
}
