// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The immutable per-lead message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::ChannelType;
use super::ids::{LeadId, TenantId};

/// Direction of a message relative to the platform.
///
/// This is the source of truth; `User`/`AI` roles exist only in context
/// rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "outbound" => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }
}

/// A single message exchanged with a lead. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    /// Monotonic insertion order assigned by the store. Summary windows are
    /// expressed in terms of this sequence.
    pub seq: i64,
    pub channel: ChannelType,
    pub direction: Direction,
    pub content: String,
    /// `text`, `media`, or `template`.
    pub content_type: String,
    /// The domain event that produced this message, if any.
    pub event_id: Option<String>,
    /// Free-form send metadata (vendor message id, failure marker).
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trip() {
        assert_eq!(Direction::from_str_value("inbound"), Direction::Inbound);
        assert_eq!(Direction::from_str_value("outbound"), Direction::Outbound);
        assert_eq!(Direction::Inbound.as_str(), "inbound");
    }
}
