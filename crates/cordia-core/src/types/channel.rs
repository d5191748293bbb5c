// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel-facing types: normalized messages, outbound envelopes, capabilities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messaging channel a lead can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Whatsapp,
    Telegram,
    Email,
    Sms,
}

impl ChannelType {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Whatsapp => "whatsapp",
            ChannelType::Telegram => "telegram",
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "whatsapp" => Some(ChannelType::Whatsapp),
            "telegram" => Some(ChannelType::Telegram),
            "email" => Some(ChannelType::Email),
            "sms" => Some(ChannelType::Sms),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body, one variant per content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Media {
        url: String,
        mime_type: Option<String>,
        caption: Option<String>,
    },
    Template {
        key: String,
        variables: BTreeMap<String, String>,
    },
}

impl MessageContent {
    /// Flat text rendering used for persistence and context assembly.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text { body } => body.clone(),
            MessageContent::Media { url, caption, .. } => match caption {
                Some(c) => format!("{c} ({url})"),
                None => url.clone(),
            },
            MessageContent::Template { key, .. } => format!("[template:{key}]"),
        }
    }

    /// The content-type discriminator string persisted alongside messages.
    pub fn type_str(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Media { .. } => "media",
            MessageContent::Template { .. } => "template",
        }
    }
}

/// A webhook payload normalized into the channel-independent shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardMessage {
    pub channel: ChannelType,
    /// Channel-scoped sender identifier (phone number, chat id, address).
    pub sender_identifier: String,
    /// Display name if the vendor payload carried one.
    pub sender_display_name: Option<String>,
    pub content: MessageContent,
    pub received_at: DateTime<Utc>,
    /// The raw vendor payload, preserved for audit and replay.
    pub channel_metadata: serde_json::Value,
}

/// Outbound send envelope handed to a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub recipient: String,
    pub content: MessageContent,
}

/// Acknowledgement returned by a channel adapter send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub accepted: bool,
    pub vendor_message_id: Option<String>,
}

/// Capabilities declared by a channel adapter.
#[derive(Debug, Clone)]
pub struct ChannelCapabilities {
    pub supports_text: bool,
    pub supports_media: bool,
    pub supports_templates: bool,
    pub max_message_length: Option<usize>,
    pub quiet_hours_honored: bool,
    pub rate_limit_per_minute: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_round_trip() {
        for channel in [
            ChannelType::Whatsapp,
            ChannelType::Telegram,
            ChannelType::Email,
            ChannelType::Sms,
        ] {
            let parsed = ChannelType::from_str_value(channel.as_str());
            assert_eq!(parsed, Some(channel));
        }
        assert_eq!(ChannelType::from_str_value("fax"), None);
    }

    #[test]
    fn content_text_rendering() {
        let text = MessageContent::Text {
            body: "hello".into(),
        };
        assert_eq!(text.as_text(), "hello");
        assert_eq!(text.type_str(), "text");

        let media = MessageContent::Media {
            url: "https://cdn.example/img.png".into(),
            mime_type: Some("image/png".into()),
            caption: Some("the deck".into()),
        };
        assert_eq!(media.as_text(), "the deck (https://cdn.example/img.png)");
        assert_eq!(media.type_str(), "media");
    }

    #[test]
    fn content_serde_is_tagged() {
        let template = MessageContent::Template {
            key: "intro_offer".into(),
            variables: BTreeMap::from([("name".to_string(), "Ana".to_string())]),
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["content_type"], "template");
        let back: MessageContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }
}
