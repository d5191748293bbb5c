// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound pipeline: webhook to normalized message to lead to reaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cordia_bus::{EventChain, EventHandler, Orchestrator};
use cordia_core::types::{ChannelType, Direction, Event, EventKind, LeadId, TenantId};
use cordia_core::{CordiaError, StorageAdapter};
use cordia_memory::MemoryManager;
use cordia_sequence::SequenceEngine;

use crate::identity::IdentityResolver;
use crate::registry::ChannelRegistry;

/// What an inbound webhook produced.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub lead_id: LeadId,
    pub message_id: String,
    pub was_created: bool,
}

/// Drives a raw vendor webhook through normalization, identity resolution,
/// memory, and the sequence engine.
pub struct InboundPipeline {
    registry: Arc<ChannelRegistry>,
    resolver: Arc<IdentityResolver>,
    memory: Arc<MemoryManager>,
    engine: Arc<SequenceEngine>,
    orchestrator: Arc<Orchestrator>,
}

impl InboundPipeline {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        resolver: Arc<IdentityResolver>,
        memory: Arc<MemoryManager>,
        engine: Arc<SequenceEngine>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            registry,
            resolver,
            memory,
            engine,
            orchestrator,
        }
    }

    /// Handle one inbound webhook.
    ///
    /// For a brand-new lead the `lead.created` event is dispatched here,
    /// which enrolls the default sequence through its handler. For a known
    /// lead the sequence engine reacts to the reply directly.
    pub async fn handle_webhook(
        &self,
        tenant: &TenantId,
        channel: ChannelType,
        raw: &serde_json::Value,
    ) -> Result<InboundOutcome, CordiaError> {
        let standard = self.registry.normalize(channel, raw)?;
        let resolved = self
            .resolver
            .resolve(
                tenant,
                channel,
                &standard.sender_identifier,
                standard.sender_display_name.as_deref(),
            )
            .await?;

        let chain = match &resolved.created_event {
            Some(created) => EventChain::caused_by(created),
            None => EventChain::root(),
        };
        let received = self
            .orchestrator
            .event_log()
            .append(
                tenant,
                EventKind::MessageReceived,
                serde_json::json!({
                    "lead_id": resolved.lead.id.0,
                    "channel": channel.as_str(),
                    "content_type": standard.content.type_str(),
                }),
                "router",
                chain,
            )
            .await?;

        let message = self
            .memory
            .add_message(
                tenant,
                &resolved.lead.id,
                &standard.content.as_text(),
                standard.content.type_str(),
                Direction::Inbound,
                channel,
                Some(received.id.clone()),
                serde_json::json!({ "vendor": standard.channel_metadata }),
            )
            .await?;
        metrics::counter!("cordia_inbound_messages", "channel" => channel.as_str()).increment(1);

        if let Some(created) = &resolved.created_event {
            // Enrollment and any other lead.created handlers run now, with
            // the message already durable.
            self.orchestrator.process_event(tenant, &created.id).await?;
        } else {
            self.engine
                .on_inbound(
                    tenant,
                    &resolved.lead.id,
                    &message,
                    EventChain::caused_by(&received),
                )
                .await?;
        }
        self.orchestrator.process_event(tenant, &received.id).await?;

        // Off the write path: compact the warm window when it has grown past
        // the threshold.
        if self.memory.compaction_due(tenant, &resolved.lead.id).await? {
            debug!(lead = %resolved.lead.id, "compaction due");
            let memory = self.memory.clone();
            let tenant = tenant.clone();
            let lead = resolved.lead.id.clone();
            tokio::spawn(async move {
                if let Err(e) = memory.run_compaction(&tenant, &lead).await {
                    tracing::warn!(lead = %lead, error = %e, "compaction job failed");
                }
            });
        }

        Ok(InboundOutcome {
            lead_id: resolved.lead.id,
            message_id: message.id,
            was_created: resolved.was_created,
        })
    }
}

/// Handles `lead.created`: enrolls the lead into the tenant's default
/// sequence, causally chained to the creation event.
pub struct LeadCreatedEnrollHandler {
    storage: Arc<dyn StorageAdapter>,
    engine: Arc<SequenceEngine>,
}

impl LeadCreatedEnrollHandler {
    pub fn new(storage: Arc<dyn StorageAdapter>, engine: Arc<SequenceEngine>) -> Self {
        Self { storage, engine }
    }
}

#[async_trait]
impl EventHandler for LeadCreatedEnrollHandler {
    fn name(&self) -> &str {
        "enroll_default"
    }

    async fn handle(&self, event: &Event) -> Result<(), CordiaError> {
        let lead_id = event
            .payload
            .get("lead_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CordiaError::Internal("lead.created payload missing lead_id".into()))?;
        let Some(sequence) = self.storage.default_sequence(&event.tenant_id).await? else {
            debug!("no default sequence configured, skipping enrollment");
            return Ok(());
        };
        self.engine
            .enroll(
                &event.tenant_id,
                &LeadId(lead_id.to_string()),
                &sequence,
                EventChain::caused_by(event),
            )
            .await?;
        Ok(())
    }
}
