// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up sequence definitions and per-lead sequence state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::ChannelType;
use super::ids::{LeadId, TenantId};

/// Condition gating a follow-up step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCondition {
    Always,
    NoReply,
    RepliedPositive,
    RepliedNegative,
}

impl StepCondition {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepCondition::Always => "always",
            StepCondition::NoReply => "no_reply",
            StepCondition::RepliedPositive => "replied_positive",
            StepCondition::RepliedNegative => "replied_negative",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "no_reply" => StepCondition::NoReply,
            "replied_positive" => StepCondition::RepliedPositive,
            "replied_negative" => StepCondition::RepliedNegative,
            _ => StepCondition::Always,
        }
    }
}

/// Sentiment classification of an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// One step of a follow-up sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpStep {
    /// 0-based dense index within the sequence.
    pub order_index: usize,
    /// Days after the previous step (0 means immediate).
    pub day_offset: i64,
    pub channel: ChannelType,
    pub template_key: String,
    pub condition: StepCondition,
    /// Optional JSON-logic expression refining the condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_expr: Option<serde_json::Value>,
}

/// An ordered follow-up sequence definition.
///
/// Immutable once stored; edits append a new row with `version + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpSequence {
    pub id: String,
    pub tenant_id: TenantId,
    pub name: String,
    /// Trigger key, e.g. `new_lead` or `ghosted_reactivation`.
    pub trigger: String,
    pub steps: Vec<FollowUpStep>,
    pub is_active: bool,
    pub is_default: bool,
    pub version: i64,
}

/// Status of a per-lead sequence state. Terminal: `completed`, `stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    NotStarted,
    InProgress,
    WaitingResponse,
    Completed,
    Stopped,
    Paused,
    Ghosted,
}

impl SequenceStatus {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStatus::NotStarted => "not_started",
            SequenceStatus::InProgress => "in_progress",
            SequenceStatus::WaitingResponse => "waiting_response",
            SequenceStatus::Completed => "completed",
            SequenceStatus::Stopped => "stopped",
            SequenceStatus::Paused => "paused",
            SequenceStatus::Ghosted => "ghosted",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "in_progress" => SequenceStatus::InProgress,
            "waiting_response" => SequenceStatus::WaitingResponse,
            "completed" => SequenceStatus::Completed,
            "stopped" => SequenceStatus::Stopped,
            "paused" => SequenceStatus::Paused,
            "ghosted" => SequenceStatus::Ghosted,
            _ => SequenceStatus::NotStarted,
        }
    }

    /// Whether the status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequenceStatus::Completed | SequenceStatus::Stopped)
    }
}

/// The per-lead cursor through a follow-up sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceState {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub sequence_id: String,
    pub sequence_version: i64,
    pub status: SequenceStatus,
    pub current_step_index: usize,
    pub started_at: DateTime<Utc>,
    pub last_step_scheduled_at: Option<DateTime<Utc>>,
    pub last_step_completed_at: Option<DateTime<Utc>>,
    pub last_interaction_type: Option<String>,
    pub paused_until: Option<DateTime<Utc>>,
    /// Times the current step has been held because its condition failed.
    pub hold_count: i64,
    /// When the scheduler should next look at this state.
    pub next_action_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter bumped on every update.
    pub row_version: i64,
}

/// A scheduled reactivation for a ghosted or lost lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivationTask {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub sequence_id: Option<String>,
    pub due_at: DateTime<Utc>,
    /// `pending`, `done`, or `cancelled`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted record making step execution idempotent under retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAttempt {
    /// `(state_id, step_index, intended_action)` joined with `:`.
    pub dedup_key: String,
    pub state_id: String,
    pub step_index: usize,
    pub action: String,
    /// Serialized prior outcome returned on repeat attempts.
    pub outcome: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StepAttempt {
    /// Build the dedup key for an intended step action.
    pub fn key(state_id: &str, step_index: usize, action: &str) -> String {
        format!("{state_id}:{step_index}:{action}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_round_trip() {
        for cond in [
            StepCondition::Always,
            StepCondition::NoReply,
            StepCondition::RepliedPositive,
            StepCondition::RepliedNegative,
        ] {
            assert_eq!(StepCondition::from_str_value(cond.as_str()), cond);
        }
    }

    #[test]
    fn sequence_status_terminality() {
        assert!(SequenceStatus::Completed.is_terminal());
        assert!(SequenceStatus::Stopped.is_terminal());
        for status in [
            SequenceStatus::NotStarted,
            SequenceStatus::InProgress,
            SequenceStatus::WaitingResponse,
            SequenceStatus::Paused,
            SequenceStatus::Ghosted,
        ] {
            assert!(!status.is_terminal(), "{status:?} must be non-terminal");
        }
    }

    #[test]
    fn dedup_key_shape() {
        assert_eq!(StepAttempt::key("st-1", 2, "dispatch"), "st-1:2:dispatch");
    }

    #[test]
    fn steps_serialize_as_json_array() {
        let step = FollowUpStep {
            order_index: 0,
            day_offset: 0,
            channel: ChannelType::Whatsapp,
            template_key: "intro".into(),
            condition: StepCondition::Always,
            condition_expr: None,
        };
        let json = serde_json::to_value(vec![step]).unwrap();
        assert_eq!(json[0]["condition"], "always");
        assert_eq!(json[0]["channel"], "whatsapp");
    }
}
