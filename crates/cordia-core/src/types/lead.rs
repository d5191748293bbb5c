// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead and channel identity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::ChannelType;
use super::ids::{LeadId, TenantId};

/// Where a lead currently stands in the contact lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    NeverContacted,
    AwaitingReply,
    InSequence,
    Paused,
    Converted,
    Dormant,
}

impl ContactStatus {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::NeverContacted => "never_contacted",
            ContactStatus::AwaitingReply => "awaiting_reply",
            ContactStatus::InSequence => "in_sequence",
            ContactStatus::Paused => "paused",
            ContactStatus::Converted => "converted",
            ContactStatus::Dormant => "dormant",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "awaiting_reply" => ContactStatus::AwaitingReply,
            "in_sequence" => ContactStatus::InSequence,
            "paused" => ContactStatus::Paused,
            "converted" => ContactStatus::Converted,
            "dormant" => ContactStatus::Dormant,
            _ => ContactStatus::NeverContacted,
        }
    }
}

/// A single contact tracked per tenant.
///
/// The lead owns its channel identities and messages; children reference it
/// by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub name: String,
    pub preferred_channel: Option<ChannelType>,
    /// IANA timezone name, e.g. `Europe/Berlin`. Quiet hours apply in this zone.
    pub timezone: String,
    pub language: String,
    pub contact_status: ContactStatus,
    pub contact_count: i64,
    pub last_contact_at: Option<DateTime<Utc>>,
    /// Precomputed score, 0-100.
    pub score: i64,
    pub tags: Vec<String>,
    pub custom_fields: serde_json::Value,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub social_handle: Option<String>,
    /// Where the lead came from (channel name for webhook stubs, "import", ...).
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// A minimal stub lead as created by the identity resolver on an
    /// unknown-identifier webhook.
    pub fn stub(
        id: LeadId,
        tenant_id: TenantId,
        name: impl Into<String>,
        channel: ChannelType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            name: name.into(),
            preferred_channel: Some(channel),
            timezone: "UTC".to_string(),
            language: "de".to_string(),
            contact_status: ContactStatus::NeverContacted,
            contact_count: 0,
            last_contact_at: None,
            score: 0,
            tags: Vec::new(),
            custom_fields: serde_json::Value::Object(Default::default()),
            email: None,
            phone: None,
            social_handle: None,
            source: Some(channel.as_str().to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A channel-scoped identifier owned by exactly one lead.
///
/// `(tenant_id, channel, identifier)` is unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub channel: ChannelType,
    pub identifier: String,
    pub last_active_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_status_round_trip() {
        for status in [
            ContactStatus::NeverContacted,
            ContactStatus::AwaitingReply,
            ContactStatus::InSequence,
            ContactStatus::Paused,
            ContactStatus::Converted,
            ContactStatus::Dormant,
        ] {
            assert_eq!(ContactStatus::from_str_value(status.as_str()), status);
        }
    }

    #[test]
    fn stub_lead_is_never_contacted() {
        let now = Utc::now();
        let lead = Lead::stub(
            LeadId("l-1".into()),
            TenantId("t-1".into()),
            "+491234567890",
            ChannelType::Whatsapp,
            now,
        );
        assert_eq!(lead.contact_status, ContactStatus::NeverContacted);
        assert_eq!(lead.source.as_deref(), Some("whatsapp"));
        assert_eq!(lead.contact_count, 0);
    }
}
