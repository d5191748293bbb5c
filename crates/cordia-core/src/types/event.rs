// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The append-only domain event record.
//!
//! Events are stored flat with base fields at the top level and the payload
//! as opaque JSON. The dotted `type` string is modeled as [`EventKind`] so
//! handler registration is typed while the wire format stays bit-exact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TenantId;

/// Maximum persisted length of an event error message.
pub const MAX_ERROR_MESSAGE_LEN: usize = 4000;

/// Dotted domain event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "lead.created")]
    LeadCreated,
    #[serde(rename = "message.received")]
    MessageReceived,
    #[serde(rename = "message.sent")]
    MessageSent,
    #[serde(rename = "send.failed")]
    SendFailed,
    #[serde(rename = "sequence.enrolled")]
    SequenceEnrolled,
    #[serde(rename = "sequence.step_executed")]
    SequenceStepExecuted,
    #[serde(rename = "sequence.completed")]
    SequenceCompleted,
    #[serde(rename = "sequence.ghosted")]
    SequenceGhosted,
    #[serde(rename = "sequence.stalled")]
    SequenceStalled,
    #[serde(rename = "reactivation.scheduled")]
    ReactivationScheduled,
    #[serde(rename = "reactivation.due")]
    ReactivationDue,
    #[serde(rename = "autopilot.action_due")]
    AutopilotActionDue,
    #[serde(rename = "autopilot.action_executed")]
    AutopilotActionExecuted,
    #[serde(rename = "identity.review_requested")]
    IdentityReviewRequested,
    #[serde(rename = "lead.wiped")]
    LeadWiped,
}

impl EventKind {
    /// The dotted wire string, e.g. `"lead.created"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LeadCreated => "lead.created",
            EventKind::MessageReceived => "message.received",
            EventKind::MessageSent => "message.sent",
            EventKind::SendFailed => "send.failed",
            EventKind::SequenceEnrolled => "sequence.enrolled",
            EventKind::SequenceStepExecuted => "sequence.step_executed",
            EventKind::SequenceCompleted => "sequence.completed",
            EventKind::SequenceGhosted => "sequence.ghosted",
            EventKind::SequenceStalled => "sequence.stalled",
            EventKind::ReactivationScheduled => "reactivation.scheduled",
            EventKind::ReactivationDue => "reactivation.due",
            EventKind::AutopilotActionDue => "autopilot.action_due",
            EventKind::AutopilotActionExecuted => "autopilot.action_executed",
            EventKind::IdentityReviewRequested => "identity.review_requested",
            EventKind::LeadWiped => "lead.wiped",
        }
    }

    /// Parse from the dotted wire string.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "lead.created" => Some(EventKind::LeadCreated),
            "message.received" => Some(EventKind::MessageReceived),
            "message.sent" => Some(EventKind::MessageSent),
            "send.failed" => Some(EventKind::SendFailed),
            "sequence.enrolled" => Some(EventKind::SequenceEnrolled),
            "sequence.step_executed" => Some(EventKind::SequenceStepExecuted),
            "sequence.completed" => Some(EventKind::SequenceCompleted),
            "sequence.ghosted" => Some(EventKind::SequenceGhosted),
            "sequence.stalled" => Some(EventKind::SequenceStalled),
            "reactivation.scheduled" => Some(EventKind::ReactivationScheduled),
            "reactivation.due" => Some(EventKind::ReactivationDue),
            "autopilot.action_due" => Some(EventKind::AutopilotActionDue),
            "autopilot.action_executed" => Some(EventKind::AutopilotActionExecuted),
            "identity.review_requested" => Some(EventKind::IdentityReviewRequested),
            "lead.wiped" => Some(EventKind::LeadWiped),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of an event. Transitions `pending -> processed` or
/// `pending -> failed` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processed,
    Failed,
}

impl EventStatus {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processed => "processed",
            EventStatus::Failed => "failed",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "processed" => EventStatus::Processed,
            "failed" => EventStatus::Failed,
            _ => EventStatus::Pending,
        }
    }

    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }
}

/// A persisted domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub tenant_id: TenantId,
    pub kind: EventKind,
    /// Event-specific data, opaque JSON.
    pub payload: serde_json::Value,
    /// Emitting subsystem name.
    pub source: String,
    pub status: EventStatus,
    /// Groups causally-related events; defaults to the event's own id.
    pub correlation_id: String,
    /// The event that directly caused this one.
    pub causation_id: Option<String>,
    pub request_id: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Truncate an error message to the persisted maximum.
pub fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
