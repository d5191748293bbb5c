// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Warm-window compaction: summarize the oldest uncompressed window via the
//! LLM provider and embed its messages into the cold index.
//!
//! The job runs off the read path. The summary window must extend the prior
//! summary (`end_seq` strictly increasing, `start_seq` contiguous); the store
//! rejects anything else, so a racing or confused job aborts and leaves the
//! prior state intact.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use cordia_core::types::{
    ConversationSummary, Direction, EmbeddingInput, Generation, InteractionEmbedding, LeadId,
    Message, TenantId,
};
use cordia_core::{CordiaError, ProviderAdapter};

use crate::manager::MemoryManager;

const SUMMARY_PROMPT: &str = "You summarize a sales conversation window. Preserve names, \
commitments, objections, prices, dates, and the lead's stated needs. Omit greetings and \
filler. Reply with 2-4 sentences of plain text.";

/// Call the provider with the configured hard timeout and jittered retries.
pub(crate) async fn generate_window_summary(
    provider: &dyn ProviderAdapter,
    window: &[Message],
    timeout: Duration,
    max_retries: u32,
) -> Result<Generation, CordiaError> {
    let transcript: String = window
        .iter()
        .map(|m| {
            let role = match m.direction {
                Direction::Inbound => "User",
                Direction::Outbound => "AI",
            };
            format!("[{}] {}: {}", m.channel, role, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut attempt = 0;
    loop {
        match tokio::time::timeout(timeout, provider.generate(SUMMARY_PROMPT, &transcript)).await {
            Ok(Ok(generation)) => return Ok(generation),
            Ok(Err(e)) if attempt >= max_retries => return Err(e),
            Err(_) if attempt >= max_retries => {
                return Err(CordiaError::Timeout { duration: timeout });
            }
            outcome => {
                let jitter_ms = rand::thread_rng().gen_range(100..500u64) * (1u64 << attempt);
                warn!(
                    attempt,
                    jitter_ms,
                    timed_out = outcome.is_err(),
                    "summary generation failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Key facts derivable without a second LLM call.
fn key_facts_for(window: &[Message]) -> serde_json::Value {
    let inbound = window.iter().filter(|m| m.direction == Direction::Inbound).count();
    let channels: Vec<&str> = {
        let mut seen: Vec<&str> = Vec::new();
        for m in window {
            let c = m.channel.as_str();
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
        seen
    };
    serde_json::json!({
        "messages": window.len(),
        "inbound": inbound,
        "outbound": window.len() - inbound,
        "channels": channels,
    })
}

impl MemoryManager {
    /// Compact the oldest uncompressed window when it exceeds the threshold.
    ///
    /// Returns the new summary, or `None` when nothing was due. On any
    /// failure the prior state is retained; the job is safe to re-run since
    /// each message is embedded at most once.
    pub async fn run_compaction(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Option<ConversationSummary>, CordiaError> {
        let prev = self.storage().latest_summary(tenant, lead).await?;
        let last_end = prev.as_ref().map(|s| s.end_seq).unwrap_or(0);

        let uncompressed = self.storage().count_messages_after(tenant, lead, last_end).await?;
        if uncompressed <= self.config().w_warm as i64 {
            return Ok(None);
        }

        let window = self
            .storage()
            .messages_after_seq(tenant, lead, last_end, self.config().w_warm)
            .await?;
        let Some(last) = window.last() else {
            return Ok(None);
        };

        let generation = generate_window_summary(
            self.provider().as_ref(),
            &window,
            Duration::from_secs(self.provider_config().timeout_secs),
            self.provider_config().max_retries,
        )
        .await?;

        // The sentiment snapshot reflects the lead's latest voice in the window.
        let sentiment = window
            .iter()
            .rev()
            .find(|m| m.direction == Direction::Inbound)
            .map(|m| self.classifier().classify(&m.content));

        let summary = ConversationSummary {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead.clone(),
            summary: generation.text.trim().to_string(),
            key_facts: key_facts_for(&window),
            sentiment,
            start_seq: prev.as_ref().map(|s| s.end_seq + 1).unwrap_or(window[0].seq),
            end_seq: last.seq,
            created_at: self.clock().now(),
        };
        self.storage().insert_summary(&summary).await?;

        self.embed_window(tenant, lead, &window).await?;

        info!(
            lead = %lead,
            start_seq = summary.start_seq,
            end_seq = summary.end_seq,
            tokens_in = generation.tokens_in,
            tokens_out = generation.tokens_out,
            "warm window compacted"
        );
        metrics::counter!("cordia_compactions").increment(1);
        Ok(Some(summary))
    }

    /// Embed every non-empty window message that has no embedding yet.
    ///
    /// The produced dimension must match the tenant's fixed index dimension.
    async fn embed_window(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        window: &[Message],
    ) -> Result<(), CordiaError> {
        let mut pending: Vec<&Message> = Vec::new();
        for message in window {
            if message.content.trim().is_empty() {
                continue;
            }
            if self
                .storage()
                .has_embedding_for_message(tenant, &message.id)
                .await?
            {
                continue;
            }
            pending.push(message);
        }
        if pending.is_empty() {
            return Ok(());
        }

        let output = self
            .embedder()
            .embed(EmbeddingInput {
                texts: pending.iter().map(|m| m.content.clone()).collect(),
            })
            .await?;
        if output.dimensions != self.config().embedding_dimensions {
            return Err(CordiaError::EmbeddingDimMismatch {
                expected: self.config().embedding_dimensions,
                actual: output.dimensions,
            });
        }

        for (message, vector) in pending.iter().zip(output.embeddings) {
            let embedding = InteractionEmbedding {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant.clone(),
                lead_id: lead.clone(),
                message_id: message.id.clone(),
                channel: message.channel.as_str().to_string(),
                interaction_type: message.direction.as_str().to_string(),
                content: message.content.clone(),
                vector,
                topics: Vec::new(),
                sentiment: match message.direction {
                    Direction::Inbound => Some(self.classifier().classify(&message.content)),
                    Direction::Outbound => None,
                },
                interaction_at: message.created_at,
            };
            self.storage().insert_embedding(&embedding).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordia_core::types::ChannelType;

    fn msg(direction: Direction, content: &str) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            tenant_id: TenantId("t-1".into()),
            lead_id: LeadId("l-1".into()),
            seq: 0,
            channel: ChannelType::Whatsapp,
            direction,
            content: content.to_string(),
            content_type: "text".to_string(),
            event_id: None,
            meta: serde_json::Value::Object(Default::default()),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn key_facts_count_directions_and_channels() {
        let window = vec![
            msg(Direction::Inbound, "hi"),
            msg(Direction::Outbound, "hello"),
            msg(Direction::Inbound, "price?"),
        ];
        let facts = key_facts_for(&window);
        assert_eq!(facts["messages"], 3);
        assert_eq!(facts["inbound"], 2);
        assert_eq!(facts["outbound"], 1);
        assert_eq!(facts["channels"][0], "whatsapp");
    }
}
