// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait — the abstract relational store.
//!
//! Every method that touches tenant data takes a [`TenantId`]; a
//! cross-tenant access path cannot be expressed through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CordiaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelIdentity, ChannelType, ConversationSummary, Event, EventKind, FollowUpSequence,
    InteractionEmbedding, Lead, LeadId, Message, ReactivationTask, ScoredInteraction,
    SequenceState, StepAttempt, TenantId,
};

/// Lead field consulted by the identity resolver's duplicate passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupField {
    SocialHandle,
    Email,
    Phone,
    Name,
}

/// Adapter for the durable relational store.
///
/// Provides ACID persistence for leads, identities, messages, summaries,
/// embeddings, events, sequences, and scheduler bookkeeping.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection).
    async fn initialize(&self) -> Result<(), CordiaError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), CordiaError>;

    // --- Leads ---

    async fn create_lead(&self, lead: &Lead) -> Result<(), CordiaError>;

    async fn get_lead(&self, tenant: &TenantId, id: &LeadId) -> Result<Option<Lead>, CordiaError>;

    async fn update_lead(&self, lead: &Lead) -> Result<(), CordiaError>;

    /// Look up a lead by one normalized duplicate-check field.
    async fn find_lead_by_field(
        &self,
        tenant: &TenantId,
        field: DedupField,
        normalized: &str,
    ) -> Result<Option<Lead>, CordiaError>;

    // --- Channel identities ---

    async fn create_identity(&self, identity: &ChannelIdentity) -> Result<(), CordiaError>;

    async fn get_identity(
        &self,
        tenant: &TenantId,
        channel: ChannelType,
        identifier: &str,
    ) -> Result<Option<ChannelIdentity>, CordiaError>;

    /// The lead's identity on a channel, if any.
    async fn identity_for_lead(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        channel: ChannelType,
    ) -> Result<Option<ChannelIdentity>, CordiaError>;

    /// Update an identity's `last_active_at`.
    async fn touch_identity(
        &self,
        tenant: &TenantId,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError>;

    // --- Messages ---

    /// Insert a message and return its assigned sequence number.
    async fn insert_message(&self, message: &Message) -> Result<i64, CordiaError>;

    /// Most recent messages for a lead, newest first.
    async fn recent_messages(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        limit: usize,
    ) -> Result<Vec<Message>, CordiaError>;

    /// Messages with `seq > after_seq`, ascending, capped at `limit`.
    async fn messages_after_seq(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<Message>, CordiaError>;

    /// Count of messages with `seq > after_seq` for a lead.
    async fn count_messages_after(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        after_seq: i64,
    ) -> Result<i64, CordiaError>;

    /// Most recent inbound message created at or after `since`.
    async fn latest_inbound_since(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        since: DateTime<Utc>,
    ) -> Result<Option<Message>, CordiaError>;

    // --- Conversation summaries ---

    /// Insert a summary row.
    ///
    /// Enforces the optimistic window rule: `start_seq` must equal the prior
    /// summary's `end_seq + 1` (or be the earliest message seq when none
    /// exists) and `end_seq` must be strictly greater than the prior
    /// `end_seq`. Conflicts abort with an error.
    async fn insert_summary(&self, summary: &ConversationSummary) -> Result<(), CordiaError>;

    async fn latest_summary(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Option<ConversationSummary>, CordiaError>;

    // --- Interaction embeddings ---

    async fn insert_embedding(&self, embedding: &InteractionEmbedding) -> Result<(), CordiaError>;

    async fn has_embedding_for_message(
        &self,
        tenant: &TenantId,
        message_id: &str,
    ) -> Result<bool, CordiaError>;

    /// Cosine-similarity query over one lead's embeddings.
    ///
    /// Returns up to `k` hits with similarity `>= threshold` (inclusive),
    /// best first. Rows whose stored dimension differs from the query are
    /// skipped.
    async fn similar_interactions(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredInteraction>, CordiaError>;

    // --- Events ---

    async fn append_event(&self, event: &Event) -> Result<(), CordiaError>;

    async fn get_event(&self, tenant: &TenantId, id: &str) -> Result<Option<Event>, CordiaError>;

    /// Idempotent; a no-op when the event is already terminal.
    async fn mark_event_processed(
        &self,
        tenant: &TenantId,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError>;

    /// Idempotent; a no-op when the event is already terminal.
    async fn mark_event_failed(
        &self,
        tenant: &TenantId,
        id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError>;

    /// Events for replay, ascending `created_at`.
    async fn events_for_replay(
        &self,
        tenant: &TenantId,
        kind: Option<EventKind>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Event>, CordiaError>;

    // --- Sequence definitions ---

    async fn store_sequence(&self, sequence: &FollowUpSequence) -> Result<(), CordiaError>;

    /// Fetch a specific version of a sequence definition.
    async fn get_sequence(
        &self,
        tenant: &TenantId,
        id: &str,
        version: i64,
    ) -> Result<Option<FollowUpSequence>, CordiaError>;

    /// The tenant's default active sequence, latest version.
    async fn default_sequence(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<FollowUpSequence>, CordiaError>;

    /// The tenant's active sequence for a trigger key, latest version.
    async fn sequence_by_trigger(
        &self,
        tenant: &TenantId,
        trigger: &str,
    ) -> Result<Option<FollowUpSequence>, CordiaError>;

    // --- Sequence states ---

    async fn create_sequence_state(&self, state: &SequenceState) -> Result<(), CordiaError>;

    async fn get_sequence_state(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<SequenceState>, CordiaError>;

    /// The non-terminal state for `(lead, sequence)`, if any.
    async fn open_sequence_state(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        sequence_id: &str,
    ) -> Result<Option<SequenceState>, CordiaError>;

    /// All non-terminal states for a lead.
    async fn open_states_for_lead(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Vec<SequenceState>, CordiaError>;

    /// Optimistic update guarded by `expected_version`. Returns `false` on a
    /// lost update (no row matched).
    async fn update_sequence_state(
        &self,
        state: &SequenceState,
        expected_version: i64,
    ) -> Result<bool, CordiaError>;

    /// Atomically claim due states so concurrent dispatcher workers never
    /// pick the same row. Claimed rows are invisible to other workers until
    /// `claim_until`.
    async fn claim_due_states(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
        claim_until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SequenceState>, CordiaError>;

    /// States in `waiting_response` whose last step completed before `cutoff`.
    async fn waiting_states_older_than(
        &self,
        tenant: &TenantId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SequenceState>, CordiaError>;

    // --- Reactivations ---

    async fn schedule_reactivation(&self, task: &ReactivationTask) -> Result<(), CordiaError>;

    async fn due_reactivations(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReactivationTask>, CordiaError>;

    async fn complete_reactivation(&self, tenant: &TenantId, id: &str)
    -> Result<(), CordiaError>;

    // --- Step attempts (idempotent advance) ---

    async fn record_step_attempt(&self, attempt: &StepAttempt) -> Result<(), CordiaError>;

    async fn get_step_attempt(
        &self,
        dedup_key: &str,
    ) -> Result<Option<StepAttempt>, CordiaError>;

    // --- GDPR wipe primitives ---

    async fn delete_summaries(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError>;

    async fn delete_embeddings(&self, tenant: &TenantId, lead: &LeadId)
    -> Result<(), CordiaError>;

    async fn delete_messages(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError>;

    async fn delete_identities(&self, tenant: &TenantId, lead: &LeadId)
    -> Result<(), CordiaError>;

    async fn delete_sequence_states(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError>;

    async fn delete_reactivations(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError>;

    async fn delete_lead(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError>;
}
