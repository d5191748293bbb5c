// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end harness: the full follow-up stack over a temp SQLite database.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use cordia_bus::{EventLog, HandlerRegistry, Orchestrator};
use cordia_config::model::CordiaConfig;
use cordia_core::types::{
    ChannelType, EventKind, FollowUpSequence, FollowUpStep, StepCondition, TenantId,
};
use cordia_core::{ChannelAdapter, CordiaError, StorageAdapter};
use cordia_memory::{MemoryHotCache, MemoryManager};
use cordia_router::{
    ChannelRegistry, IdentityResolver, InboundOutcome, InboundPipeline, LeadCreatedEnrollHandler,
};
use cordia_scheduler::{
    ActionDueHandler, Dispatcher, InFlightGuard, ReactivationDueHandler, TickStats,
};
use cordia_sequence::{LexiconClassifier, SequenceEngine, StaticTemplates};
use cordia_storage::SqliteStorage;

use crate::mock_channel::MockChannel;
use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;
use crate::test_clock::TestClock;

/// Embedding dimension used by the harness and its mock embedder.
pub const TEST_EMBEDDING_DIM: usize = 8;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: CordiaConfig,
    templates: HashMap<String, String>,
    provider_responses: Vec<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = CordiaConfig::default();
        config.memory.embedding_dimensions = TEST_EMBEDDING_DIM;
        Self {
            config,
            templates: HashMap::from([
                ("intro".to_string(), "Hallo {{name}}, schön von dir zu hören!".to_string()),
                ("nudge".to_string(), "Kurze Erinnerung, {{name}}.".to_string()),
                ("followup".to_string(), "Noch Fragen, {{name}}?".to_string()),
                ("reactivate".to_string(), "Lange nichts gehört, {{name}}!".to_string()),
            ]),
            provider_responses: Vec::new(),
        }
    }

    /// Replace the whole configuration. The embedding dimension is forced
    /// back to the mock embedder's.
    pub fn with_config(mut self, mut config: CordiaConfig) -> Self {
        config.memory.embedding_dimensions = TEST_EMBEDDING_DIM;
        self.config = config;
        self
    }

    pub fn with_template(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(key.into(), text.into());
        self
    }

    pub fn with_provider_responses(mut self, responses: Vec<String>) -> Self {
        self.provider_responses = responses;
        self
    }

    pub async fn build(self) -> Result<TestHarness, CordiaError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| CordiaError::Storage {
            source: Box::new(e),
        })?;
        let mut storage_config = self.config.storage.clone();
        storage_config.database_path = temp_dir
            .path()
            .join("harness.db")
            .to_string_lossy()
            .into_owned();
        let sqlite = SqliteStorage::new(storage_config);
        sqlite.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(sqlite);

        let clock = Arc::new(TestClock::new());
        let event_log = Arc::new(EventLog::new(storage.clone(), clock.clone()));
        let provider = Arc::new(MockProvider::with_responses(self.provider_responses));
        let classifier = Arc::new(LexiconClassifier::new(&self.config.sequence));
        let hot = Arc::new(MemoryHotCache::new(clock.clone()));
        let memory = Arc::new(MemoryManager::new(
            storage.clone(),
            hot.clone(),
            Arc::new(MockEmbedder::new(TEST_EMBEDDING_DIM)),
            provider.clone(),
            classifier.clone(),
            event_log.clone(),
            clock.clone(),
            self.config.memory.clone(),
            self.config.provider.clone(),
        ));

        let whatsapp = Arc::new(MockChannel::new(ChannelType::Whatsapp));
        let telegram = Arc::new(MockChannel::new(ChannelType::Telegram));
        let registry = Arc::new(
            ChannelRegistry::new()
                .with_adapter(whatsapp.clone() as Arc<dyn ChannelAdapter>)
                .with_adapter(telegram.clone() as Arc<dyn ChannelAdapter>),
        );

        let engine = Arc::new(SequenceEngine::new(
            storage.clone(),
            memory.clone(),
            event_log.clone(),
            registry.adapters(),
            Arc::new(StaticTemplates::new(self.templates)),
            classifier,
            clock.clone(),
            self.config.sequence.clone(),
        ));

        let handlers = HandlerRegistry::builder()
            .register(
                EventKind::LeadCreated,
                Arc::new(LeadCreatedEnrollHandler::new(storage.clone(), engine.clone())),
            )
            .register(
                EventKind::AutopilotActionDue,
                Arc::new(ActionDueHandler::new(engine.clone(), event_log.clone())),
            )
            .register(
                EventKind::ReactivationDue,
                Arc::new(ReactivationDueHandler::new(engine.clone())),
            )
            .build();
        let orchestrator = Arc::new(Orchestrator::new(event_log.clone(), Arc::new(handlers)));

        let dispatcher = Arc::new(Dispatcher::new(
            storage.clone(),
            engine.clone(),
            orchestrator.clone(),
            InFlightGuard::new(),
            clock.clone(),
            self.config.scheduler.clone(),
        ));

        let resolver = Arc::new(IdentityResolver::new(
            storage.clone(),
            event_log.clone(),
            clock.clone(),
            self.config.identity.clone(),
        ));
        let pipeline = Arc::new(InboundPipeline::new(
            registry,
            resolver,
            memory.clone(),
            engine.clone(),
            orchestrator.clone(),
        ));

        Ok(TestHarness {
            tenant: TenantId("t-test".to_string()),
            clock,
            storage,
            event_log,
            provider,
            whatsapp,
            telegram,
            hot,
            memory,
            engine,
            orchestrator,
            dispatcher,
            pipeline,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// The assembled stack plus handles to every mock for assertions.
pub struct TestHarness {
    pub tenant: TenantId,
    pub clock: Arc<TestClock>,
    pub storage: Arc<dyn StorageAdapter>,
    pub event_log: Arc<EventLog>,
    pub provider: Arc<MockProvider>,
    pub whatsapp: Arc<MockChannel>,
    pub telegram: Arc<MockChannel>,
    pub hot: Arc<MemoryHotCache>,
    pub memory: Arc<MemoryManager>,
    pub engine: Arc<SequenceEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Arc<Dispatcher>,
    pub pipeline: Arc<InboundPipeline>,
    pub config: CordiaConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drive a WhatsApp webhook through the inbound pipeline.
    pub async fn whatsapp_webhook(
        &self,
        sender: &str,
        text: &str,
    ) -> Result<InboundOutcome, CordiaError> {
        self.pipeline
            .handle_webhook(
                &self.tenant,
                ChannelType::Whatsapp,
                &MockChannel::webhook(sender, text),
            )
            .await
    }

    /// One scheduler pass.
    pub async fn tick(&self) -> Result<TickStats, CordiaError> {
        self.dispatcher.tick(&self.tenant).await
    }

    /// Store the tenant's default `new_lead` sequence with the given steps.
    pub async fn seed_default_sequence(
        &self,
        steps: Vec<FollowUpStep>,
    ) -> Result<FollowUpSequence, CordiaError> {
        let sequence = FollowUpSequence {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant.clone(),
            name: "new lead follow-up".to_string(),
            trigger: "new_lead".to_string(),
            steps,
            is_active: true,
            is_default: true,
            version: 1,
        };
        self.storage.store_sequence(&sequence).await?;
        Ok(sequence)
    }

    /// Store the tenant's `ghosted_reactivation` sequence.
    pub async fn seed_reactivation_sequence(&self) -> Result<FollowUpSequence, CordiaError> {
        let sequence = FollowUpSequence {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant.clone(),
            name: "win-back".to_string(),
            trigger: "ghosted_reactivation".to_string(),
            steps: vec![step(0, 0, StepCondition::Always, "reactivate")],
            is_active: true,
            is_default: false,
            version: 1,
        };
        self.storage.store_sequence(&sequence).await?;
        Ok(sequence)
    }
}

/// Shorthand for a WhatsApp text step.
pub fn step(order_index: usize, day_offset: i64, condition: StepCondition, template: &str) -> FollowUpStep {
    FollowUpStep {
        order_index,
        day_offset,
        channel: ChannelType::Whatsapp,
        template_key: template.to_string(),
        condition,
        condition_expr: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_assembles_a_working_stack() {
        let harness = TestHarness::builder().build().await.unwrap();
        let context = harness
            .memory
            .get_smart_context(&harness.tenant, &cordia_core::LeadId("nobody".into()), None)
            .await
            .unwrap();
        assert!(context.starts_with("ZUSAMMENFASSUNG: neu"));
    }
}
