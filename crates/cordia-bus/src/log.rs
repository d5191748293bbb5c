// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable append and status transitions for the domain event log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use cordia_core::traits::Clock;
use cordia_core::types::{Event, EventKind, EventStatus, TenantId};
use cordia_core::{CordiaError, StorageAdapter};

/// Correlation/causation linkage for a new event.
///
/// A root event starts a new correlation group; a caused event inherits the
/// correlation id of its cause and records the cause as `causation_id`.
#[derive(Debug, Clone, Default)]
pub struct EventChain {
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub request_id: Option<String>,
}

impl EventChain {
    /// A new correlation group. The appended event's correlation id defaults
    /// to its own id.
    pub fn root() -> Self {
        Self::default()
    }

    /// Chain onto an existing event: same correlation, causation set to the
    /// cause's id.
    pub fn caused_by(cause: &Event) -> Self {
        Self {
            correlation_id: Some(cause.correlation_id.clone()),
            causation_id: Some(cause.id.clone()),
            request_id: cause.request_id.clone(),
        }
    }

    /// Attach an external request id.
    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// The append-only domain event log.
///
/// Writes are durable before `append` returns; the single-writer store
/// serializes them. Terminal status transitions are idempotent.
pub struct EventLog {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
}

impl EventLog {
    pub fn new(storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Append a new pending event and return it in full.
    pub async fn append(
        &self,
        tenant: &TenantId,
        kind: EventKind,
        payload: serde_json::Value,
        source: &str,
        chain: EventChain,
    ) -> Result<Event, CordiaError> {
        self.append_with_meta(
            tenant,
            kind,
            payload,
            source,
            chain,
            serde_json::Value::Object(Default::default()),
        )
        .await
    }

    /// Append an event carrying explicit meta (attempt counters, replay refs).
    pub async fn append_with_meta(
        &self,
        tenant: &TenantId,
        kind: EventKind,
        payload: serde_json::Value,
        source: &str,
        chain: EventChain,
        meta: serde_json::Value,
    ) -> Result<Event, CordiaError> {
        let id = Uuid::new_v4().to_string();
        let event = Event {
            correlation_id: chain.correlation_id.unwrap_or_else(|| id.clone()),
            id,
            tenant_id: tenant.clone(),
            kind,
            payload,
            source: source.to_string(),
            status: EventStatus::Pending,
            causation_id: chain.causation_id,
            request_id: chain.request_id,
            meta,
            created_at: self.clock.now(),
            processed_at: None,
            error_message: None,
        };
        self.storage.append_event(&event).await?;
        metrics::counter!("cordia_events_appended", "type" => kind.as_str()).increment(1);
        debug!(event_id = %event.id, kind = %kind, correlation = %event.correlation_id, "event appended");
        Ok(event)
    }

    pub async fn get(&self, tenant: &TenantId, id: &str) -> Result<Option<Event>, CordiaError> {
        self.storage.get_event(tenant, id).await
    }

    /// Mark processed. Idempotent; a no-op when the event is already terminal.
    pub async fn mark_processed(&self, tenant: &TenantId, id: &str) -> Result<(), CordiaError> {
        self.storage
            .mark_event_processed(tenant, id, self.clock.now())
            .await
    }

    /// Mark failed. Idempotent; the message is truncated by the store.
    pub async fn mark_failed(
        &self,
        tenant: &TenantId,
        id: &str,
        error: &str,
    ) -> Result<(), CordiaError> {
        self.storage
            .mark_event_failed(tenant, id, error, self.clock.now())
            .await
    }

    /// Events for replay, ascending `created_at`.
    pub async fn list_for_replay(
        &self,
        tenant: &TenantId,
        kind: Option<EventKind>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Event>, CordiaError> {
        self.storage.events_for_replay(tenant, kind, since, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordia_config::model::StorageConfig;
    use cordia_core::{StorageAdapter, SystemClock};
    use cordia_storage::SqliteStorage;

    async fn setup() -> (EventLog, TenantId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("bus.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let log = EventLog::new(Arc::new(storage), Arc::new(SystemClock));
        (log, TenantId("t-1".into()), dir)
    }

    #[tokio::test]
    async fn correlation_defaults_to_own_id() {
        let (log, tenant, _dir) = setup().await;
        let event = log
            .append(
                &tenant,
                EventKind::LeadCreated,
                serde_json::json!({"lead_id": "l-1"}),
                "identity",
                EventChain::root(),
            )
            .await
            .unwrap();
        assert_eq!(event.correlation_id, event.id);
        assert!(event.causation_id.is_none());
    }

    #[tokio::test]
    async fn caused_by_preserves_correlation() {
        let (log, tenant, _dir) = setup().await;
        let root = log
            .append(
                &tenant,
                EventKind::LeadCreated,
                serde_json::json!({}),
                "identity",
                EventChain::root(),
            )
            .await
            .unwrap();
        let child = log
            .append(
                &tenant,
                EventKind::SequenceEnrolled,
                serde_json::json!({}),
                "sequence",
                EventChain::caused_by(&root),
            )
            .await
            .unwrap();
        assert_eq!(child.correlation_id, root.correlation_id);
        assert_eq!(child.causation_id.as_deref(), Some(root.id.as_str()));
        assert!(child.created_at >= root.created_at);
    }

    #[tokio::test]
    async fn terminal_transitions_are_idempotent() {
        let (log, tenant, _dir) = setup().await;
        let event = log
            .append(
                &tenant,
                EventKind::MessageSent,
                serde_json::json!({}),
                "dispatch",
                EventChain::root(),
            )
            .await
            .unwrap();

        log.mark_processed(&tenant, &event.id).await.unwrap();
        log.mark_failed(&tenant, &event.id, "late error").await.unwrap();

        let stored = log.get(&tenant, &event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Processed);
        assert!(stored.error_message.is_none());
    }
}
