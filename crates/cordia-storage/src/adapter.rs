// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use cordia_config::model::StorageConfig;
use cordia_core::traits::storage::DedupField;
use cordia_core::types::{
    ChannelIdentity, ChannelType, ConversationSummary, Event, EventKind, FollowUpSequence,
    InteractionEmbedding, Lead, LeadId, Message, ReactivationTask, ScoredInteraction,
    SequenceState, StepAttempt, TenantId,
};
use cordia_core::{AdapterType, CordiaError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not
    /// initialized.
    fn db(&self) -> Result<&Database, CordiaError> {
        self.db.get().ok_or_else(|| CordiaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CordiaError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| CordiaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CordiaError> {
        self.db()?.close().await
    }

    // --- Leads ---

    async fn create_lead(&self, lead: &Lead) -> Result<(), CordiaError> {
        queries::leads::create_lead(self.db()?, lead).await
    }

    async fn get_lead(&self, tenant: &TenantId, id: &LeadId) -> Result<Option<Lead>, CordiaError> {
        queries::leads::get_lead(self.db()?, tenant, id).await
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), CordiaError> {
        queries::leads::update_lead(self.db()?, lead).await
    }

    async fn find_lead_by_field(
        &self,
        tenant: &TenantId,
        field: DedupField,
        normalized: &str,
    ) -> Result<Option<Lead>, CordiaError> {
        queries::leads::find_lead_by_field(self.db()?, tenant, field, normalized).await
    }

    // --- Channel identities ---

    async fn create_identity(&self, identity: &ChannelIdentity) -> Result<(), CordiaError> {
        queries::identities::create_identity(self.db()?, identity).await
    }

    async fn get_identity(
        &self,
        tenant: &TenantId,
        channel: ChannelType,
        identifier: &str,
    ) -> Result<Option<ChannelIdentity>, CordiaError> {
        queries::identities::get_identity(self.db()?, tenant, channel, identifier).await
    }

    async fn identity_for_lead(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        channel: ChannelType,
    ) -> Result<Option<ChannelIdentity>, CordiaError> {
        queries::identities::identity_for_lead(self.db()?, tenant, lead, channel).await
    }

    async fn touch_identity(
        &self,
        tenant: &TenantId,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError> {
        queries::identities::touch_identity(self.db()?, tenant, id, at).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<i64, CordiaError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn recent_messages(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        limit: usize,
    ) -> Result<Vec<Message>, CordiaError> {
        queries::messages::recent_messages(self.db()?, tenant, lead, limit).await
    }

    async fn messages_after_seq(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<Message>, CordiaError> {
        queries::messages::messages_after_seq(self.db()?, tenant, lead, after_seq, limit).await
    }

    async fn count_messages_after(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        after_seq: i64,
    ) -> Result<i64, CordiaError> {
        queries::messages::count_messages_after(self.db()?, tenant, lead, after_seq).await
    }

    async fn latest_inbound_since(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        since: DateTime<Utc>,
    ) -> Result<Option<Message>, CordiaError> {
        queries::messages::latest_inbound_since(self.db()?, tenant, lead, since).await
    }

    // --- Conversation summaries ---

    async fn insert_summary(&self, summary: &ConversationSummary) -> Result<(), CordiaError> {
        queries::summaries::insert_summary(self.db()?, summary).await
    }

    async fn latest_summary(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Option<ConversationSummary>, CordiaError> {
        queries::summaries::latest_summary(self.db()?, tenant, lead).await
    }

    // --- Interaction embeddings ---

    async fn insert_embedding(&self, embedding: &InteractionEmbedding) -> Result<(), CordiaError> {
        queries::embeddings::insert_embedding(self.db()?, embedding).await
    }

    async fn has_embedding_for_message(
        &self,
        tenant: &TenantId,
        message_id: &str,
    ) -> Result<bool, CordiaError> {
        queries::embeddings::has_embedding_for_message(self.db()?, tenant, message_id).await
    }

    async fn similar_interactions(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredInteraction>, CordiaError> {
        queries::embeddings::similar_interactions(self.db()?, tenant, lead, query, k, threshold)
            .await
    }

    // --- Events ---

    async fn append_event(&self, event: &Event) -> Result<(), CordiaError> {
        queries::events::append_event(self.db()?, event).await
    }

    async fn get_event(&self, tenant: &TenantId, id: &str) -> Result<Option<Event>, CordiaError> {
        queries::events::get_event(self.db()?, tenant, id).await
    }

    async fn mark_event_processed(
        &self,
        tenant: &TenantId,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError> {
        queries::events::mark_event_processed(self.db()?, tenant, id, at).await
    }

    async fn mark_event_failed(
        &self,
        tenant: &TenantId,
        id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CordiaError> {
        queries::events::mark_event_failed(self.db()?, tenant, id, error, at).await
    }

    async fn events_for_replay(
        &self,
        tenant: &TenantId,
        kind: Option<EventKind>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Event>, CordiaError> {
        queries::events::events_for_replay(self.db()?, tenant, kind, since, limit).await
    }

    // --- Sequence definitions ---

    async fn store_sequence(&self, sequence: &FollowUpSequence) -> Result<(), CordiaError> {
        queries::sequences::store_sequence(self.db()?, sequence).await
    }

    async fn get_sequence(
        &self,
        tenant: &TenantId,
        id: &str,
        version: i64,
    ) -> Result<Option<FollowUpSequence>, CordiaError> {
        queries::sequences::get_sequence(self.db()?, tenant, id, version).await
    }

    async fn default_sequence(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<FollowUpSequence>, CordiaError> {
        queries::sequences::default_sequence(self.db()?, tenant).await
    }

    async fn sequence_by_trigger(
        &self,
        tenant: &TenantId,
        trigger: &str,
    ) -> Result<Option<FollowUpSequence>, CordiaError> {
        queries::sequences::sequence_by_trigger(self.db()?, tenant, trigger).await
    }

    // --- Sequence states ---

    async fn create_sequence_state(&self, state: &SequenceState) -> Result<(), CordiaError> {
        queries::sequences::create_sequence_state(self.db()?, state).await
    }

    async fn get_sequence_state(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<SequenceState>, CordiaError> {
        queries::sequences::get_sequence_state(self.db()?, tenant, id).await
    }

    async fn open_sequence_state(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
        sequence_id: &str,
    ) -> Result<Option<SequenceState>, CordiaError> {
        queries::sequences::open_sequence_state(self.db()?, tenant, lead, sequence_id).await
    }

    async fn open_states_for_lead(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<Vec<SequenceState>, CordiaError> {
        queries::sequences::open_states_for_lead(self.db()?, tenant, lead).await
    }

    async fn update_sequence_state(
        &self,
        state: &SequenceState,
        expected_version: i64,
    ) -> Result<bool, CordiaError> {
        queries::sequences::update_sequence_state(self.db()?, state, expected_version).await
    }

    async fn claim_due_states(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
        claim_until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SequenceState>, CordiaError> {
        queries::sequences::claim_due_states(self.db()?, tenant, now, claim_until, limit).await
    }

    async fn waiting_states_older_than(
        &self,
        tenant: &TenantId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SequenceState>, CordiaError> {
        queries::sequences::waiting_states_older_than(self.db()?, tenant, cutoff).await
    }

    // --- Reactivations ---

    async fn schedule_reactivation(&self, task: &ReactivationTask) -> Result<(), CordiaError> {
        queries::reactivations::schedule_reactivation(self.db()?, task).await
    }

    async fn due_reactivations(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReactivationTask>, CordiaError> {
        queries::reactivations::due_reactivations(self.db()?, tenant, now).await
    }

    async fn complete_reactivation(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<(), CordiaError> {
        queries::reactivations::complete_reactivation(self.db()?, tenant, id).await
    }

    // --- Step attempts ---

    async fn record_step_attempt(&self, attempt: &StepAttempt) -> Result<(), CordiaError> {
        queries::sequences::record_step_attempt(self.db()?, attempt).await
    }

    async fn get_step_attempt(
        &self,
        dedup_key: &str,
    ) -> Result<Option<StepAttempt>, CordiaError> {
        queries::sequences::get_step_attempt(self.db()?, dedup_key).await
    }

    // --- GDPR wipe primitives ---

    async fn delete_summaries(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError> {
        queries::summaries::delete_summaries(self.db()?, tenant, lead).await
    }

    async fn delete_embeddings(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError> {
        queries::embeddings::delete_embeddings(self.db()?, tenant, lead).await
    }

    async fn delete_messages(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError> {
        queries::messages::delete_messages(self.db()?, tenant, lead).await
    }

    async fn delete_identities(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError> {
        queries::identities::delete_identities(self.db()?, tenant, lead).await
    }

    async fn delete_sequence_states(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError> {
        queries::sequences::delete_sequence_states(self.db()?, tenant, lead).await
    }

    async fn delete_reactivations(
        &self,
        tenant: &TenantId,
        lead: &LeadId,
    ) -> Result<(), CordiaError> {
        queries::reactivations::delete_reactivations(self.db()?, tenant, lead).await
    }

    async fn delete_lead(&self, tenant: &TenantId, lead: &LeadId) -> Result<(), CordiaError> {
        queries::leads::delete_lead(self.db()?, tenant, lead).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        assert!(storage.health_check().await.is_err());
    }

    #[tokio::test]
    async fn full_lead_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);

        let tenant = TenantId("t-1".to_string());
        let lead_id = LeadId("l-1".to_string());
        let now = Utc::now();

        let lead = Lead::stub(
            lead_id.clone(),
            tenant.clone(),
            "+491234567890",
            ChannelType::Whatsapp,
            now,
        );
        storage.create_lead(&lead).await.unwrap();

        let identity = ChannelIdentity {
            id: "ci-1".to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead_id.clone(),
            channel: ChannelType::Whatsapp,
            identifier: "+491234567890".to_string(),
            last_active_at: now,
            metadata: serde_json::Value::Object(Default::default()),
        };
        storage.create_identity(&identity).await.unwrap();

        let message = Message {
            seq: 0,
            id: "m-1".to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead_id.clone(),
            channel: ChannelType::Whatsapp,
            direction: cordia_core::types::Direction::Inbound,
            content: "Hi, tell me more".to_string(),
            content_type: "text".to_string(),
            event_id: None,
            meta: serde_json::Value::Object(Default::default()),
            created_at: now,
        };
        let seq = storage.insert_message(&message).await.unwrap();
        assert!(seq > 0);

        let recent = storage.recent_messages(&tenant, &lead_id, 10).await.unwrap();
        assert_eq!(recent.len(), 1);

        // Cascade: deleting the lead removes identities and messages.
        storage.delete_lead(&tenant, &lead_id).await.unwrap();
        assert!(
            storage
                .get_identity(&tenant, ChannelType::Whatsapp, "+491234567890")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            storage
                .recent_messages(&tenant, &lead_id, 10)
                .await
                .unwrap()
                .is_empty()
        );

        storage.close().await.unwrap();
    }
}
