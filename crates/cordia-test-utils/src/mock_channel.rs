// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter: captured sends, scripted failures, and a simple
//! two-shape webhook format mirroring real vendor fallback behavior.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use cordia_core::error::CordiaError;
use cordia_core::traits::{ChannelAdapter, PluginAdapter};
use cordia_core::types::{
    AdapterType, ChannelCapabilities, ChannelType, HealthStatus, MessageContent,
    OutboundEnvelope, SendReceipt, StandardMessage,
};

/// A mock messaging channel.
///
/// `send` captures `(recipient, envelope)` pairs for assertions; queued
/// failures are returned (once each) before any capture. `normalize` accepts
/// `{"sender", "text"}` and falls back to `{"from", "body"}`.
pub struct MockChannel {
    channel: ChannelType,
    sent: Mutex<Vec<(String, OutboundEnvelope)>>,
    failures: Mutex<VecDeque<CordiaError>>,
}

impl MockChannel {
    pub fn new(channel: ChannelType) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue an error returned by the next `send` call.
    pub fn fail_next(&self, error: CordiaError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn sent_messages(&self) -> Vec<(String, OutboundEnvelope)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Build a primary-shape webhook payload for tests.
    pub fn webhook(sender: &str, text: &str) -> serde_json::Value {
        serde_json::json!({ "sender": sender, "text": text })
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn channel(&self) -> ChannelType {
        self.channel
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_text: true,
            supports_media: false,
            supports_templates: false,
            max_message_length: None,
            quiet_hours_honored: true,
            rate_limit_per_minute: 600,
        }
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<StandardMessage, CordiaError> {
        let (sender, text) = if let (Some(sender), Some(text)) = (
            raw.get("sender").and_then(|v| v.as_str()),
            raw.get("text").and_then(|v| v.as_str()),
        ) {
            (sender, text)
        } else if let (Some(from), Some(body)) = (
            raw.get("from").and_then(|v| v.as_str()),
            raw.get("body").and_then(|v| v.as_str()),
        ) {
            warn!("primary shape did not match, parsed fallback payload");
            (from, body)
        } else {
            return Err(CordiaError::UnparseablePayload {
                channel: self.channel.as_str().into(),
                detail: "neither mock shape matched".into(),
            });
        };
        Ok(StandardMessage {
            channel: self.channel,
            sender_identifier: sender.to_string(),
            sender_display_name: raw.get("name").and_then(|v| v.as_str()).map(str::to_string),
            content: MessageContent::Text {
                body: text.to_string(),
            },
            received_at: Utc::now(),
            channel_metadata: raw.clone(),
        })
    }

    async fn send(
        &self,
        recipient: &str,
        envelope: &OutboundEnvelope,
    ) -> Result<SendReceipt, CordiaError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), envelope.clone()));
        Ok(SendReceipt {
            accepted: true,
            vendor_message_id: Some(format!("mock-{}", uuid::Uuid::new_v4())),
        })
    }
}
