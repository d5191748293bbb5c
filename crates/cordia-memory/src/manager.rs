// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory manager: message ingestion, context assembly, GDPR wipe.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use cordia_bus::{EventChain, EventLog};
use cordia_config::model::{MemoryConfig, ProviderConfig};
use cordia_core::traits::Clock;
use cordia_core::types::{
    ChannelType, Direction, EventKind, LeadId, Message, ScoredInteraction, TenantId,
};
use cordia_core::{
    CordiaError, EmbeddingAdapter, HotCacheAdapter, ProviderAdapter, SentimentClassifier,
    StorageAdapter,
};

use crate::hot::{HotEntry, hot_key};

/// Orchestrates the hot, warm, and cold memory tiers for all leads.
pub struct MemoryManager {
    storage: Arc<dyn StorageAdapter>,
    hot: Arc<dyn HotCacheAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    classifier: Arc<dyn SentimentClassifier>,
    event_log: Arc<EventLog>,
    clock: Arc<dyn Clock>,
    config: MemoryConfig,
    provider_config: ProviderConfig,
}

impl MemoryManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        hot: Arc<dyn HotCacheAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        classifier: Arc<dyn SentimentClassifier>,
        event_log: Arc<EventLog>,
        clock: Arc<dyn Clock>,
        config: MemoryConfig,
        provider_config: ProviderConfig,
    ) -> Self {
        Self {
            storage,
            hot,
            embedder,
            provider,
            classifier,
            event_log,
            clock,
            config,
            provider_config,
        }
    }

    pub(crate) fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub(crate) fn embedder(&self) -> &Arc<dyn EmbeddingAdapter> {
        &self.embedder
    }

    pub(crate) fn provider(&self) -> &Arc<dyn ProviderAdapter> {
        &self.provider
    }

    pub(crate) fn classifier(&self) -> &Arc<dyn SentimentClassifier> {
        &self.classifier
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub(crate) fn provider_config(&self) -> &ProviderConfig {
        &self.provider_config
    }

    /// Record a message: hot push + trim + TTL refresh, then the durable
    /// append. Returns the stored message with its assigned sequence.
    ///
    /// Compaction is never run here; callers check [`Self::compaction_due`]
    /// and schedule [`Self::run_compaction`] off the write path.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_message(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        content: &str,
        content_type: &str,
        direction: Direction,
        channel: ChannelType,
        event_id: Option<String>,
        meta: serde_json::Value,
    ) -> Result<Message, CordiaError> {
        let mut message = Message {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead.clone(),
            seq: 0,
            channel,
            direction,
            content: content.to_string(),
            content_type: content_type.to_string(),
            event_id,
            meta,
            created_at: self.clock.now(),
        };

        let key = hot_key(&tenant.0, &lead.0);
        self.hot
            .lpush(&key, HotEntry::from_message(&message).encode())
            .await?;
        self.hot.ltrim(&key, 0, self.config.n_hot as i64 - 1).await?;
        self.hot
            .expire(&key, Duration::from_secs(self.config.t_hot_secs))
            .await?;

        message.seq = self.storage.insert_message(&message).await?;
        debug!(lead = %lead, seq = message.seq, direction = direction.as_str(), "message recorded");
        Ok(message)
    }

    /// Whether the lead's uncompressed warm window exceeds the compaction
    /// threshold.
    pub async fn compaction_due(&self, tenant: &TenantId, lead: &LeadId) -> Result<bool, CordiaError> {
        let last_end = self
            .storage
            .latest_summary(tenant, lead)
            .await?
            .map(|s| s.end_seq)
            .unwrap_or(0);
        let uncompressed = self.storage.count_messages_after(tenant, lead, last_end).await?;
        Ok(uncompressed > self.config.w_warm as i64)
    }

    /// Assemble the full prompt context for a lead.
    ///
    /// Suspends at most four times: the hot read (with warm-up hydration
    /// folded into the miss branch), the summary read, the optional cold
    /// query, and the return.
    pub async fn get_smart_context(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        query: Option<&str>,
    ) -> Result<String, CordiaError> {
        let started = std::time::Instant::now();
        let key = hot_key(&tenant.0, &lead.0);

        // Hot read; hydrate from the warm store on a cold start.
        let raw = self.hot.lrange(&key, 0, -1).await?;
        let entries: Vec<HotEntry> = if raw.is_empty() {
            self.hydrate_hot(tenant, lead, &key).await?
        } else {
            raw.iter().filter_map(|r| HotEntry::decode(r)).collect()
        };

        // Warm: the latest rolling summary, or the fresh-lead marker.
        let summary = self.storage.latest_summary(tenant, lead).await?;
        let summary_text = summary
            .as_ref()
            .map(|s| s.summary.as_str())
            .unwrap_or("neu");

        // Cold: semantic recall, only when the caller supplies a query.
        let cold = match query {
            Some(q) if !q.trim().is_empty() => self.cold_hits(tenant, lead, q).await,
            _ => Vec::new(),
        };

        let mut context = format!("ZUSAMMENFASSUNG: {summary_text}");
        if !cold.is_empty() {
            context.push_str("\n\nRELEVANTE INTERAKTIONEN:");
            for hit in &cold {
                context.push_str(&format!("\n- {}", hit.embedding.content));
            }
        }
        context.push_str("\n\nVERLAUF:");
        // Hot storage is newest-first; the context reads chronologically.
        for entry in entries.iter().rev() {
            context.push('\n');
            context.push_str(&entry.render_line());
        }

        metrics::histogram!("cordia_context_assembly_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(context)
    }

    /// Warm-up path: load the last `n_hot` messages from the warm store,
    /// push them chronologically so the newest ends at the head, set the TTL.
    async fn hydrate_hot(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        key: &str,
    ) -> Result<Vec<HotEntry>, CordiaError> {
        let recent = self
            .storage
            .recent_messages(tenant, lead, self.config.n_hot)
            .await?;
        if recent.is_empty() {
            return Ok(Vec::new());
        }
        for message in recent.iter().rev() {
            self.hot
                .lpush(key, HotEntry::from_message(message).encode())
                .await?;
        }
        self.hot
            .expire(key, Duration::from_secs(self.config.t_hot_secs))
            .await?;
        metrics::counter!("cordia_context_warmups").increment(1);
        debug!(lead = %lead, count = recent.len(), "hot ring hydrated from warm store");
        Ok(recent.iter().map(HotEntry::from_message).collect())
    }

    /// Cold retrieval under the vector budget. Any failure or timeout
    /// degrades to an empty block; the context is still returned.
    async fn cold_hits(&self, tenant: &TenantId, lead: &LeadId, query: &str) -> Vec<ScoredInteraction> {
        let budget = Duration::from_millis(self.config.vector_timeout_ms);
        let lookup = async {
            let output = self
                .embedder
                .embed(cordia_core::types::EmbeddingInput {
                    texts: vec![query.to_string()],
                })
                .await?;
            let vector = output
                .embeddings
                .into_iter()
                .next()
                .ok_or_else(|| CordiaError::Internal("embedder returned no vector".into()))?;
            self.storage
                .similar_interactions(
                    tenant,
                    lead,
                    &vector,
                    self.config.k_cold,
                    self.config.similarity_threshold as f32,
                )
                .await
        };
        match tokio::time::timeout(budget, lookup).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(lead = %lead, error = %e, "cold retrieval failed, omitting block");
                metrics::counter!("cordia_cold_degraded").increment(1);
                Vec::new()
            }
            Err(_) => {
                warn!(lead = %lead, budget_ms = self.config.vector_timeout_ms,
                      "cold retrieval timed out, omitting block");
                metrics::counter!("cordia_cold_degraded").increment(1);
                Vec::new()
            }
        }
    }

    /// GDPR wipe: remove every trace of the lead across all tiers.
    ///
    /// Deletion proceeds through each subsystem even after a failure;
    /// anything left behind is reported in `WIPE_INCOMPLETE`.
    pub async fn wipe(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError> {
        let key = hot_key(&tenant.0, &lead.0);
        let mut remaining = Vec::new();

        if self.hot.del(&key).await.is_err() {
            remaining.push("hot_cache".to_string());
        }
        if self.storage.delete_summaries(tenant, lead).await.is_err() {
            remaining.push("summaries".to_string());
        }
        if self.storage.delete_embeddings(tenant, lead).await.is_err() {
            remaining.push("embeddings".to_string());
        }
        if self.storage.delete_sequence_states(tenant, lead).await.is_err() {
            remaining.push("sequence_states".to_string());
        }
        if self.storage.delete_reactivations(tenant, lead).await.is_err() {
            remaining.push("reactivations".to_string());
        }
        if self.storage.delete_messages(tenant, lead).await.is_err() {
            remaining.push("messages".to_string());
        }
        if self.storage.delete_identities(tenant, lead).await.is_err() {
            remaining.push("identities".to_string());
        }
        if self.storage.delete_lead(tenant, lead).await.is_err() {
            remaining.push("lead".to_string());
        }

        if !remaining.is_empty() {
            return Err(CordiaError::WipeIncomplete { remaining });
        }

        self.event_log
            .append(
                tenant,
                EventKind::LeadWiped,
                serde_json::json!({ "lead_id": lead.0 }),
                "memory",
                EventChain::root(),
            )
            .await?;
        Ok(())
    }
}
