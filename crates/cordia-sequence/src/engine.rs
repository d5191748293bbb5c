// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-lead sequence state machine.
//!
//! States move `in_progress ⇄ waiting_response` until the last step
//! completes; `paused`, `stopped`, and `ghosted` are reachable from any
//! non-terminal state. Terminal states are `completed` and `stopped`.
//! Step dispatch is idempotent: a persisted attempt record keyed
//! `(state, step, action)` short-circuits repeats to the prior outcome.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cordia_bus::{EventChain, EventLog};
use cordia_config::model::SequenceConfig;
use cordia_core::traits::Clock;
use cordia_core::types::{
    ChannelType, ContactStatus, Direction, EventKind, FollowUpSequence, LeadId, Message,
    MessageContent, OutboundEnvelope, ReactivationTask, Sentiment, SequenceState, SequenceStatus,
    StepAttempt, StepCondition, TenantId,
};
use cordia_core::{ChannelAdapter, CordiaError, SentimentClassifier, StorageAdapter};
use cordia_memory::MemoryManager;

use crate::template::TemplateRenderer;

/// Trigger key of the sequence a reactivated lead is enrolled into.
pub const REACTIVATION_TRIGGER: &str = "ghosted_reactivation";

/// What a single `advance` call did.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The step condition passed and the message went out.
    Dispatched { message_id: String },
    /// The condition failed; the state re-arms after a backoff.
    Held { until: DateTime<Utc> },
    /// The state moved past its last step.
    Completed,
    /// Nothing to do (terminal, paused, or stale work).
    Skipped { reason: &'static str },
    /// A prior attempt already dispatched this step.
    Duplicate { prior: serde_json::Value },
}

/// Exponential hold backoff: `min(1d * 2^hold_count, 7d)`.
fn hold_backoff(hold_count: i64) -> Duration {
    let days = 1i64 << hold_count.clamp(0, 3) as u32;
    Duration::days(days.min(7))
}

pub struct SequenceEngine {
    storage: Arc<dyn StorageAdapter>,
    memory: Arc<MemoryManager>,
    event_log: Arc<EventLog>,
    channels: HashMap<ChannelType, Arc<dyn ChannelAdapter>>,
    templates: Arc<dyn TemplateRenderer>,
    classifier: Arc<dyn SentimentClassifier>,
    clock: Arc<dyn Clock>,
    config: SequenceConfig,
}

impl SequenceEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        memory: Arc<MemoryManager>,
        event_log: Arc<EventLog>,
        channels: HashMap<ChannelType, Arc<dyn ChannelAdapter>>,
        templates: Arc<dyn TemplateRenderer>,
        classifier: Arc<dyn SentimentClassifier>,
        clock: Arc<dyn Clock>,
        config: SequenceConfig,
    ) -> Self {
        Self {
            storage,
            memory,
            event_log,
            channels,
            templates,
            classifier,
            clock,
            config,
        }
    }

    /// Enroll a lead into a sequence.
    ///
    /// A no-op returning `None` when a non-terminal state already exists for
    /// `(lead, sequence)` or the sequence has no steps; two webhooks racing
    /// on the same identifier therefore produce one enrollment.
    pub async fn enroll(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        sequence: &FollowUpSequence,
        chain: EventChain,
    ) -> Result<Option<SequenceState>, CordiaError> {
        if sequence.steps.is_empty() {
            warn!(sequence_id = %sequence.id, "enroll skipped: sequence has no steps");
            return Ok(None);
        }
        if self
            .storage
            .open_sequence_state(tenant, lead, &sequence.id)
            .await?
            .is_some()
        {
            debug!(lead = %lead, sequence_id = %sequence.id, "enroll skipped: already enrolled");
            return Ok(None);
        }

        let now = self.clock.now();
        let state = SequenceState {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead.clone(),
            sequence_id: sequence.id.clone(),
            sequence_version: sequence.version,
            status: SequenceStatus::InProgress,
            current_step_index: 0,
            started_at: now,
            last_step_scheduled_at: None,
            last_step_completed_at: None,
            last_interaction_type: None,
            paused_until: None,
            hold_count: 0,
            next_action_at: Some(now + Duration::days(sequence.steps[0].day_offset)),
            completed_at: None,
            row_version: 0,
        };
        self.storage.create_sequence_state(&state).await?;

        if let Some(mut lead_row) = self.storage.get_lead(tenant, lead).await? {
            lead_row.contact_status = ContactStatus::InSequence;
            lead_row.updated_at = now;
            self.storage.update_lead(&lead_row).await?;
        }

        self.event_log
            .append(
                tenant,
                EventKind::SequenceEnrolled,
                serde_json::json!({
                    "state_id": state.id,
                    "lead_id": lead.0,
                    "sequence_id": sequence.id,
                    "version": sequence.version,
                }),
                "sequence",
                chain,
            )
            .await?;
        info!(lead = %lead, sequence_id = %sequence.id, "lead enrolled");
        Ok(Some(state))
    }

    /// Advance a state: evaluate the current step's condition and dispatch,
    /// hold, or complete.
    pub async fn advance(
        &self,
        tenant: &TenantId,
        state_id: &str,
        chain: EventChain,
    ) -> Result<AdvanceOutcome, CordiaError> {
        let now = self.clock.now();
        let Some(mut state) = self.storage.get_sequence_state(tenant, state_id).await? else {
            return Err(CordiaError::not_found("sequence state", state_id));
        };
        if state.status.is_terminal() {
            return Ok(AdvanceOutcome::Skipped { reason: "terminal" });
        }
        if let Some(until) = state.paused_until {
            if until > now {
                return Ok(AdvanceOutcome::Skipped { reason: "paused" });
            }
            // The pause window has passed; fall through as resumed.
            state.paused_until = None;
            if state.status == SequenceStatus::Paused {
                state.status = SequenceStatus::InProgress;
            }
        }
        if state.status == SequenceStatus::Ghosted {
            return Ok(AdvanceOutcome::Skipped { reason: "ghosted" });
        }

        let Some(sequence) = self
            .storage
            .get_sequence(tenant, &state.sequence_id, state.sequence_version)
            .await?
        else {
            return Err(CordiaError::not_found("sequence", state.sequence_id.clone()));
        };

        let idx = state.current_step_index;
        if idx >= sequence.steps.len() {
            return self.complete(tenant, state, now, chain).await;
        }
        let step = &sequence.steps[idx];

        // Idempotency: a repeat within the retry window returns the recorded
        // outcome instead of dispatching twice.
        let dedup_key = StepAttempt::key(&state.id, idx, "dispatch");
        if let Some(prior) = self.storage.get_step_attempt(&dedup_key).await? {
            debug!(state_id, step = idx, "duplicate advance, returning prior outcome");
            return Ok(AdvanceOutcome::Duplicate { prior: prior.outcome });
        }

        // A replayed or repeated advance for a step whose delay has not
        // elapsed is not an error, just stale work.
        if let Some(next_at) = state.next_action_at {
            if next_at > now {
                debug!(state_id, step = idx, %next_at, "advance before due time, skipping");
                return Ok(AdvanceOutcome::Skipped { reason: "not_due" });
            }
        }

        // Condition, evaluated against inbound traffic since the last
        // outbound send for this sequence.
        let since = state.last_step_completed_at.unwrap_or(state.started_at);
        let latest_inbound = self
            .storage
            .latest_inbound_since(tenant, &state.lead_id, since)
            .await?;
        let reply_sentiment = latest_inbound
            .as_ref()
            .map(|m| self.classifier.classify(&m.content));
        let pass = match step.condition {
            StepCondition::Always => true,
            StepCondition::NoReply => latest_inbound.is_none(),
            StepCondition::RepliedPositive => reply_sentiment == Some(Sentiment::Positive),
            StepCondition::RepliedNegative => reply_sentiment == Some(Sentiment::Negative),
        };

        if !pass {
            let capped = hold_backoff(state.hold_count) == hold_backoff(state.hold_count + 1);
            let until = now + hold_backoff(state.hold_count);
            state.hold_count += 1;
            state.status = SequenceStatus::WaitingResponse;
            state.next_action_at = Some(until);
            let expected = state.row_version;
            self.save(tenant, &state, expected).await?;
            if capped {
                self.event_log
                    .append(
                        tenant,
                        EventKind::SequenceStalled,
                        serde_json::json!({
                            "state_id": state.id,
                            "lead_id": state.lead_id.0,
                            "step_index": idx,
                            "hold_count": state.hold_count,
                        }),
                        "sequence",
                        chain,
                    )
                    .await?;
            }
            debug!(state_id, step = idx, %until, "condition failed, holding");
            return Ok(AdvanceOutcome::Held { until });
        }

        self.dispatch_step(tenant, state, &sequence, now, chain).await
    }

    /// Render, send, persist, and move the cursor for the current step.
    async fn dispatch_step(
        &self,
        tenant: &TenantId,
        mut state: SequenceState,
        sequence: &FollowUpSequence,
        now: DateTime<Utc>,
        chain: EventChain,
    ) -> Result<AdvanceOutcome, CordiaError> {
        let idx = state.current_step_index;
        let step = &sequence.steps[idx];

        let Some(lead) = self.storage.get_lead(tenant, &state.lead_id).await? else {
            return Err(CordiaError::not_found("lead", state.lead_id.0.clone()));
        };
        let Some(identity) = self
            .storage
            .identity_for_lead(tenant, &state.lead_id, step.channel)
            .await?
        else {
            return Err(CordiaError::not_found("channel identity", state.lead_id.0.clone()));
        };
        let adapter = self
            .channels
            .get(&step.channel)
            .ok_or_else(|| CordiaError::ChannelUnavailable {
                channel: step.channel.as_str().to_string(),
                source: None,
            })?;

        let text = self.templates.render(&step.template_key, &lead)?;
        let envelope = OutboundEnvelope {
            recipient: identity.identifier.clone(),
            content: MessageContent::Text { body: text.clone() },
        };

        let receipt = match adapter.send(&identity.identifier, &envelope).await {
            Ok(receipt) => receipt,
            Err(e) => {
                return self
                    .record_send_failure(tenant, &state, step.channel, &text, e, chain)
                    .await;
            }
        };

        let event = self
            .event_log
            .append(
                tenant,
                EventKind::SequenceStepExecuted,
                serde_json::json!({
                    "state_id": state.id,
                    "lead_id": state.lead_id.0,
                    "sequence_id": state.sequence_id,
                    "step_index": idx,
                    "channel": step.channel.as_str(),
                    "template_key": step.template_key,
                }),
                "sequence",
                chain,
            )
            .await?;

        let message = self
            .memory
            .add_message(
                tenant,
                &state.lead_id,
                &text,
                "text",
                Direction::Outbound,
                step.channel,
                Some(event.id.clone()),
                serde_json::json!({ "vendor_message_id": receipt.vendor_message_id.clone() }),
            )
            .await?;

        self.event_log
            .append(
                tenant,
                EventKind::MessageSent,
                serde_json::json!({
                    "message_id": message.id,
                    "lead_id": state.lead_id.0,
                    "channel": step.channel.as_str(),
                    "vendor_message_id": receipt.vendor_message_id.clone(),
                }),
                "sequence",
                EventChain::caused_by(&event),
            )
            .await?;

        self.storage
            .record_step_attempt(&StepAttempt {
                dedup_key: StepAttempt::key(&state.id, idx, "dispatch"),
                state_id: state.id.clone(),
                step_index: idx,
                action: "dispatch".to_string(),
                outcome: serde_json::json!({
                    "message_id": message.id,
                    "vendor_message_id": receipt.vendor_message_id,
                }),
                created_at: now,
            })
            .await?;

        let mut lead = lead;
        lead.contact_count += 1;
        lead.last_contact_at = Some(now);
        lead.contact_status = ContactStatus::AwaitingReply;
        lead.updated_at = now;
        self.storage.update_lead(&lead).await?;

        state.current_step_index = idx + 1;
        state.last_step_scheduled_at = Some(now);
        state.last_step_completed_at = Some(now);
        state.hold_count = 0;
        let expected = state.row_version;

        if state.current_step_index >= sequence.steps.len() {
            state.status = SequenceStatus::Completed;
            state.completed_at = Some(now);
            state.next_action_at = None;
            self.save(tenant, &state, expected).await?;
            self.event_log
                .append(
                    tenant,
                    EventKind::SequenceCompleted,
                    serde_json::json!({ "state_id": state.id, "lead_id": state.lead_id.0 }),
                    "sequence",
                    EventChain::caused_by(&event),
                )
                .await?;
            metrics::counter!("cordia_sequence_completed").increment(1);
            info!(state_id = %state.id, "sequence completed");
        } else {
            state.status = SequenceStatus::WaitingResponse;
            let offset = sequence.steps[state.current_step_index].day_offset;
            state.next_action_at = Some(now + Duration::days(offset));
            self.save(tenant, &state, expected).await?;
        }

        metrics::counter!("cordia_steps_dispatched").increment(1);

        // Off the write path: outbound traffic grows the warm window too.
        if self.memory.compaction_due(tenant, &state.lead_id).await? {
            let memory = self.memory.clone();
            let tenant = tenant.clone();
            let lead = state.lead_id.clone();
            tokio::spawn(async move {
                if let Err(e) = memory.run_compaction(&tenant, &lead).await {
                    warn!(lead = %lead, error = %e, "compaction job failed");
                }
            });
        }

        Ok(AdvanceOutcome::Dispatched {
            message_id: message.id,
        })
    }

    /// A failed send leaves the cursor untouched: persist the failed
    /// outbound message, emit `send.failed`, re-arm with backoff, and
    /// surface the error.
    async fn record_send_failure(
        &self,
        tenant: &TenantId,
        state: &SequenceState,
        channel: ChannelType,
        text: &str,
        error: CordiaError,
        chain: EventChain,
    ) -> Result<AdvanceOutcome, CordiaError> {
        let now = self.clock.now();
        warn!(state_id = %state.id, error = %error, "step send failed");
        metrics::counter!("cordia_send_failures", "channel" => channel.as_str()).increment(1);

        let event = self
            .event_log
            .append(
                tenant,
                EventKind::SendFailed,
                serde_json::json!({
                    "state_id": state.id,
                    "lead_id": state.lead_id.0,
                    "channel": channel.as_str(),
                    "error": error.to_string(),
                }),
                "sequence",
                chain,
            )
            .await?;
        self.memory
            .add_message(
                tenant,
                &state.lead_id,
                text,
                "text",
                Direction::Outbound,
                channel,
                Some(event.id),
                serde_json::json!({ "failed": true, "error": error.to_string() }),
            )
            .await?;

        let mut held = state.clone();
        let until = now + hold_backoff(held.hold_count);
        held.hold_count += 1;
        held.next_action_at = Some(until);
        let expected = held.row_version;
        self.save(tenant, &held, expected).await?;

        Err(error)
    }

    /// React to an inbound message: any state waiting on a response resumes
    /// and the next step's condition is evaluated immediately.
    pub async fn on_inbound(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        message: &Message,
        chain: EventChain,
    ) -> Result<(), CordiaError> {
        let now = self.clock.now();
        let sentiment = self.classifier.classify(&message.content);
        for mut state in self.storage.open_states_for_lead(tenant, lead).await? {
            if state.status != SequenceStatus::WaitingResponse {
                continue;
            }
            state.status = SequenceStatus::InProgress;
            state.last_interaction_type = Some(sentiment.as_str().to_string());
            state.next_action_at = Some(now);
            let expected = state.row_version;
            self.save(tenant, &state, expected).await?;
            self.advance(tenant, &state.id, chain.clone()).await?;
        }
        Ok(())
    }

    /// Ghost leads whose `waiting_response` outlived the ghost threshold and
    /// schedule a single reactivation in the configured window.
    pub async fn ghost_sweep(&self, tenant: &TenantId) -> Result<usize, CordiaError> {
        let now = self.clock.now();
        let cutoff = now - Duration::days(self.config.ghost_days);
        let mut ghosted = 0;

        for mut state in self.storage.waiting_states_older_than(tenant, cutoff).await? {
            let since = state.last_step_completed_at.unwrap_or(state.started_at);
            if self
                .storage
                .latest_inbound_since(tenant, &state.lead_id, since)
                .await?
                .is_some()
            {
                continue;
            }

            state.status = SequenceStatus::Ghosted;
            state.next_action_at = None;
            let expected = state.row_version;
            self.save(tenant, &state, expected).await?;

            if let Some(mut lead) = self.storage.get_lead(tenant, &state.lead_id).await? {
                lead.contact_status = ContactStatus::Dormant;
                lead.updated_at = now;
                self.storage.update_lead(&lead).await?;
            }

            let ghost_event = self
                .event_log
                .append(
                    tenant,
                    EventKind::SequenceGhosted,
                    serde_json::json!({ "state_id": state.id, "lead_id": state.lead_id.0 }),
                    "sequence",
                    EventChain::root(),
                )
                .await?;

            let window = self.config.reactivation_min_days..=self.config.reactivation_max_days;
            let due_in = rand::thread_rng().gen_range(window);
            let task = ReactivationTask {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant.clone(),
                lead_id: state.lead_id.clone(),
                sequence_id: Some(state.sequence_id.clone()),
                due_at: now + Duration::days(due_in),
                status: "pending".to_string(),
                created_at: now,
            };
            self.storage.schedule_reactivation(&task).await?;
            self.event_log
                .append(
                    tenant,
                    EventKind::ReactivationScheduled,
                    serde_json::json!({
                        "task_id": task.id,
                        "lead_id": state.lead_id.0,
                        "due_at": task.due_at.to_rfc3339(),
                    }),
                    "sequence",
                    EventChain::caused_by(&ghost_event),
                )
                .await?;

            info!(state_id = %state.id, due_in_days = due_in, "lead ghosted, reactivation scheduled");
            ghosted += 1;
        }
        Ok(ghosted)
    }

    /// Re-enroll a reactivated lead into the tenant's reactivation sequence.
    pub async fn handle_reactivation(
        &self,
        tenant: &TenantId,
        task: &ReactivationTask,
        chain: EventChain,
    ) -> Result<(), CordiaError> {
        match self.storage.sequence_by_trigger(tenant, REACTIVATION_TRIGGER).await? {
            Some(sequence) => {
                self.enroll(tenant, &task.lead_id, &sequence, chain).await?;
            }
            None => {
                warn!(lead = %task.lead_id, "no reactivation sequence configured, dropping task");
            }
        }
        self.storage.complete_reactivation(tenant, &task.id).await
    }

    /// Short-circuit all advance checks until `until`.
    pub async fn pause(
        &self,
        tenant: &TenantId,
        state_id: &str,
        until: DateTime<Utc>,
    ) -> Result<(), CordiaError> {
        let Some(mut state) = self.storage.get_sequence_state(tenant, state_id).await? else {
            return Err(CordiaError::not_found("sequence state", state_id));
        };
        if state.status.is_terminal() {
            return Ok(());
        }
        state.status = SequenceStatus::Paused;
        state.paused_until = Some(until);
        state.next_action_at = Some(until);
        let expected = state.row_version;
        self.save(tenant, &state, expected).await
    }

    /// Resume a paused state; the next check happens on the following tick.
    pub async fn resume(&self, tenant: &TenantId, state_id: &str) -> Result<(), CordiaError> {
        let Some(mut state) = self.storage.get_sequence_state(tenant, state_id).await? else {
            return Err(CordiaError::not_found("sequence state", state_id));
        };
        if state.status != SequenceStatus::Paused {
            return Ok(());
        }
        state.status = SequenceStatus::InProgress;
        state.paused_until = None;
        state.next_action_at = Some(self.clock.now());
        let expected = state.row_version;
        self.save(tenant, &state, expected).await
    }

    /// Terminally stop a state.
    pub async fn stop(&self, tenant: &TenantId, state_id: &str) -> Result<(), CordiaError> {
        let Some(mut state) = self.storage.get_sequence_state(tenant, state_id).await? else {
            return Err(CordiaError::not_found("sequence state", state_id));
        };
        if state.status.is_terminal() {
            return Ok(());
        }
        state.status = SequenceStatus::Stopped;
        state.next_action_at = None;
        let expected = state.row_version;
        self.save(tenant, &state, expected).await
    }

    async fn complete(
        &self,
        tenant: &TenantId,
        mut state: SequenceState,
        now: DateTime<Utc>,
        chain: EventChain,
    ) -> Result<AdvanceOutcome, CordiaError> {
        state.status = SequenceStatus::Completed;
        state.completed_at = Some(now);
        state.next_action_at = None;
        let expected = state.row_version;
        self.save(tenant, &state, expected).await?;
        self.event_log
            .append(
                tenant,
                EventKind::SequenceCompleted,
                serde_json::json!({ "state_id": state.id, "lead_id": state.lead_id.0 }),
                "sequence",
                chain,
            )
            .await?;
        Ok(AdvanceOutcome::Completed)
    }

    /// Optimistic save: on a lost update, re-read and retry once on top of
    /// the fresh version. A state that turned terminal underneath is left
    /// alone.
    async fn save(
        &self,
        tenant: &TenantId,
        state: &SequenceState,
        expected_version: i64,
    ) -> Result<(), CordiaError> {
        if self.storage.update_sequence_state(state, expected_version).await? {
            return Ok(());
        }
        let Some(fresh) = self.storage.get_sequence_state(tenant, &state.id).await? else {
            return Err(CordiaError::not_found("sequence state", state.id.clone()));
        };
        if fresh.status.is_terminal() {
            warn!(state_id = %state.id, "lost update against a terminal state, dropping changes");
            return Ok(());
        }
        let mut retry = state.clone();
        retry.row_version = fresh.row_version;
        if self.storage.update_sequence_state(&retry, fresh.row_version).await? {
            return Ok(());
        }
        Err(CordiaError::Internal(format!(
            "sequence state {} update conflict after retry",
            state.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_backoff_doubles_and_caps_at_seven_days() {
        assert_eq!(hold_backoff(0), Duration::days(1));
        assert_eq!(hold_backoff(1), Duration::days(2));
        assert_eq!(hold_backoff(2), Duration::days(4));
        assert_eq!(hold_backoff(3), Duration::days(7));
        assert_eq!(hold_backoff(10), Duration::days(7));
    }
}
