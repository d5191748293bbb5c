// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-ring entry encoding and rendering.

use serde::{Deserialize, Serialize};

use cordia_core::types::{ChannelType, Direction, Message};

/// Cache key for a lead's hot ring.
pub fn hot_key(tenant: &str, lead: &str) -> String {
    format!("hot:{tenant}:{lead}")
}

/// One message as stored in the hot ring, newest at the head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotEntry {
    pub channel: ChannelType,
    pub direction: Direction,
    pub content: String,
}

impl HotEntry {
    pub fn from_message(message: &Message) -> Self {
        Self {
            channel: message.channel,
            direction: message.direction,
            content: message.content.clone(),
        }
    }

    /// Serialize for the cache list.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a cache list value; `None` on corrupt entries so one bad value
    /// never breaks context assembly.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// The context line `[channel] Role: content`, with the role derived
    /// from direction: inbound is the lead (`User`), outbound is the
    /// assistant (`AI`).
    pub fn render_line(&self) -> String {
        let role = match self.direction {
            Direction::Inbound => "User",
            Direction::Outbound => "AI",
        };
        format!("[{}] {}: {}", self.channel, role, self.content)
    }
}
