// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event handlers bridging the dispatcher's events to the sequence engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cordia_bus::{EventChain, EventHandler, EventLog};
use cordia_core::CordiaError;
use cordia_core::types::{Event, EventKind, LeadId, ReactivationTask, TenantId};
use cordia_sequence::SequenceEngine;

/// Handles `autopilot.action_due`: advances the referenced state and records
/// the execution, causally chained to the due event.
pub struct ActionDueHandler {
    engine: Arc<SequenceEngine>,
    event_log: Arc<EventLog>,
}

impl ActionDueHandler {
    pub fn new(engine: Arc<SequenceEngine>, event_log: Arc<EventLog>) -> Self {
        Self { engine, event_log }
    }
}

#[async_trait]
impl EventHandler for ActionDueHandler {
    fn name(&self) -> &str {
        "action_due"
    }

    async fn handle(&self, event: &Event) -> Result<(), CordiaError> {
        let state_id = event
            .payload
            .get("state_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CordiaError::Internal("action_due payload missing state_id".into()))?;

        let outcome = self
            .engine
            .advance(&event.tenant_id, state_id, EventChain::caused_by(event))
            .await?;

        self.event_log
            .append(
                &event.tenant_id,
                EventKind::AutopilotActionExecuted,
                serde_json::json!({
                    "state_id": state_id,
                    "outcome": format!("{outcome:?}"),
                }),
                "scheduler",
                EventChain::caused_by(event),
            )
            .await?;
        Ok(())
    }
}

/// Handles `reactivation.due`: re-enrolls the lead through the engine.
pub struct ReactivationDueHandler {
    engine: Arc<SequenceEngine>,
}

impl ReactivationDueHandler {
    pub fn new(engine: Arc<SequenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for ReactivationDueHandler {
    fn name(&self) -> &str {
        "reactivation_due"
    }

    async fn handle(&self, event: &Event) -> Result<(), CordiaError> {
        let task = task_from_payload(&event.tenant_id, &event.payload)?;
        self.engine
            .handle_reactivation(&event.tenant_id, &task, EventChain::caused_by(event))
            .await
    }
}

/// Rebuild the reactivation task the dispatcher serialized into the payload.
fn task_from_payload(
    tenant: &TenantId,
    payload: &serde_json::Value,
) -> Result<ReactivationTask, CordiaError> {
    let get = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| CordiaError::Internal(format!("reactivation payload missing {key}")))
    };
    let due_at = get("due_at")?
        .parse::<DateTime<Utc>>()
        .map_err(|e| CordiaError::Internal(format!("bad due_at in reactivation payload: {e}")))?;
    Ok(ReactivationTask {
        id: get("task_id")?,
        tenant_id: tenant.clone(),
        lead_id: LeadId(get("lead_id")?),
        sequence_id: payload
            .get("sequence_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        due_at,
        status: "pending".to_string(),
        created_at: due_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_payload() {
        let tenant = TenantId("t-1".into());
        let payload = serde_json::json!({
            "task_id": "r-1",
            "lead_id": "l-1",
            "sequence_id": "seq-1",
            "due_at": "2026-05-01T09:00:00Z",
        });
        let task = task_from_payload(&tenant, &payload).unwrap();
        assert_eq!(task.id, "r-1");
        assert_eq!(task.lead_id.0, "l-1");
        assert_eq!(task.sequence_id.as_deref(), Some("seq-1"));

        let missing = task_from_payload(&tenant, &serde_json::json!({}));
        assert!(missing.is_err());
    }
}
