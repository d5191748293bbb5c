// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event dispatch with at-most-once semantics, retry, and replay.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use cordia_core::CordiaError;
use cordia_core::types::{Event, EventKind, EventStatus, TenantId};

use crate::log::{EventChain, EventLog};
use crate::registry::HandlerRegistry;

/// Dispatches events to their registered handlers.
///
/// A pending event is processed by invoking its handlers in registration
/// order under one logical unit. The first handler failure marks the event
/// failed and stops dispatch; the remaining handlers never run. An event is
/// never re-dispatched once terminal: recovery appends a new event.
pub struct Orchestrator {
    log: Arc<EventLog>,
    registry: Arc<HandlerRegistry>,
}

impl Orchestrator {
    pub fn new(log: Arc<EventLog>, registry: Arc<HandlerRegistry>) -> Self {
        Self { log, registry }
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Process a single event by id. Absent or terminal events are a no-op.
    pub async fn process_event(&self, tenant: &TenantId, id: &str) -> Result<(), CordiaError> {
        let Some(event) = self.log.get(tenant, id).await? else {
            debug!(event_id = id, "process_event: absent, skipping");
            return Ok(());
        };
        if event.status.is_terminal() {
            debug!(event_id = id, status = event.status.as_str(), "process_event: terminal, skipping");
            return Ok(());
        }

        let handlers = self.registry.handlers_for(event.kind);
        if handlers.is_empty() {
            // Auto-ack: nothing is interested in this kind.
            self.log.mark_processed(tenant, id).await?;
            return Ok(());
        }

        for handler in handlers {
            if let Err(e) = handler.handle(&event).await {
                let message = format!("{}: {e}", handler.name());
                warn!(event_id = id, kind = %event.kind, handler = handler.name(), error = %e,
                      "handler failed, marking event failed");
                metrics::counter!("cordia_events_failed", "type" => event.kind.as_str()).increment(1);
                self.log.mark_failed(tenant, id, &message).await?;
                return Ok(());
            }
        }

        self.log.mark_processed(tenant, id).await?;
        metrics::counter!("cordia_events_processed", "type" => event.kind.as_str()).increment(1);
        Ok(())
    }

    /// Append-and-process in one step. The common path for emitters that
    /// want their event handled in the same task.
    pub async fn emit(
        &self,
        tenant: &TenantId,
        kind: EventKind,
        payload: serde_json::Value,
        source: &str,
        chain: EventChain,
    ) -> Result<Event, CordiaError> {
        let event = self.log.append(tenant, kind, payload, source, chain).await?;
        self.process_event(tenant, &event.id).await?;
        Ok(event)
    }

    /// Append a retry of a failed event.
    ///
    /// The new event has a distinct id, the same correlation id, and
    /// `causation_id` pointing at the failed event. The attempt counter lives
    /// in `meta`; backoff between attempts is the caller's responsibility.
    pub async fn retry(&self, failed: &Event) -> Result<Event, CordiaError> {
        let attempt = failed.meta.get("attempt").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        let event = self
            .log
            .append_with_meta(
                &failed.tenant_id,
                failed.kind,
                failed.payload.clone(),
                &failed.source,
                EventChain::caused_by(failed),
                serde_json::json!({ "attempt": attempt }),
            )
            .await?;
        self.process_event(&failed.tenant_id, &event.id).await?;
        Ok(event)
    }

    /// Replay events matching the filter.
    ///
    /// Each targeted event is re-dispatched through a fresh event (distinct
    /// id, original correlation id, `causation_id` = the original event), so
    /// the append-only invariant holds and handler emissions chain correctly.
    /// Returns the number of events replayed.
    pub async fn replay(
        &self,
        tenant: &TenantId,
        kind: Option<EventKind>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<usize, CordiaError> {
        let targets = self.log.list_for_replay(tenant, kind, since, limit).await?;
        let mut replayed = 0;
        for original in &targets {
            // Pending events are still owned by their first dispatch.
            if original.status == EventStatus::Pending {
                continue;
            }
            let copy = self
                .log
                .append_with_meta(
                    tenant,
                    original.kind,
                    original.payload.clone(),
                    &original.source,
                    EventChain::caused_by(original),
                    serde_json::json!({ "replay_of": original.id }),
                )
                .await?;
            self.process_event(tenant, &copy.id).await?;
            replayed += 1;
        }
        debug!(count = replayed, "replay complete");
        Ok(replayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EventHandler;
    use async_trait::async_trait;
    use cordia_config::model::StorageConfig;
    use cordia_core::{StorageAdapter, SystemClock};
    use cordia_storage::SqliteStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Succeeding;

    #[async_trait]
    impl EventHandler for Succeeding {
        fn name(&self) -> &str {
            "ok"
        }
        async fn handle(&self, _event: &Event) -> Result<(), CordiaError> {
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn handle(&self, _event: &Event) -> Result<(), CordiaError> {
            Err(CordiaError::Internal("handler exploded".into()))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        async fn handle(&self, _event: &Event) -> Result<(), CordiaError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn setup(registry: HandlerRegistry) -> (Orchestrator, TenantId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("orch.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let log = Arc::new(EventLog::new(Arc::new(storage), Arc::new(SystemClock)));
        (
            Orchestrator::new(log, Arc::new(registry)),
            TenantId("t-1".into()),
            dir,
        )
    }

    #[tokio::test]
    async fn no_handlers_auto_acks() {
        let (orch, tenant, _dir) = setup(HandlerRegistry::builder().build()).await;
        let event = orch
            .emit(
                &tenant,
                EventKind::MessageSent,
                serde_json::json!({}),
                "test",
                EventChain::root(),
            )
            .await
            .unwrap();
        let stored = orch.event_log().get(&tenant, &event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Processed);
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn first_failure_stops_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(EventKind::LeadCreated, Arc::new(Failing))
            .register(EventKind::LeadCreated, Arc::new(Counting(calls.clone())))
            .build();
        let (orch, tenant, _dir) = setup(registry).await;

        let event = orch
            .emit(
                &tenant,
                EventKind::LeadCreated,
                serde_json::json!({}),
                "test",
                EventChain::root(),
            )
            .await
            .unwrap();

        let stored = orch.event_log().get(&tenant, &event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Failed);
        assert!(stored.error_message.unwrap().starts_with("failing:"));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "later handlers must not run");
    }

    #[tokio::test]
    async fn terminal_events_are_not_redispatched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(EventKind::LeadCreated, Arc::new(Counting(calls.clone())))
            .build();
        let (orch, tenant, _dir) = setup(registry).await;

        let event = orch
            .emit(
                &tenant,
                EventKind::LeadCreated,
                serde_json::json!({}),
                "test",
                EventChain::root(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        orch.process_event(&tenant, &event.id).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "terminal event re-dispatched");
    }

    #[tokio::test]
    async fn retry_chains_to_failed_event() {
        let registry = HandlerRegistry::builder()
            .register(EventKind::SendFailed, Arc::new(Succeeding))
            .build();
        let (orch, tenant, _dir) = setup(registry).await;

        let failed = orch
            .event_log()
            .append(
                &tenant,
                EventKind::SendFailed,
                serde_json::json!({"lead_id": "l-1"}),
                "dispatch",
                EventChain::root(),
            )
            .await
            .unwrap();
        orch.event_log()
            .mark_failed(&tenant, &failed.id, "channel down")
            .await
            .unwrap();
        let failed = orch.event_log().get(&tenant, &failed.id).await.unwrap().unwrap();

        let retried = orch.retry(&failed).await.unwrap();
        assert_ne!(retried.id, failed.id);
        assert_eq!(retried.correlation_id, failed.correlation_id);
        assert_eq!(retried.causation_id.as_deref(), Some(failed.id.as_str()));
        assert_eq!(retried.meta["attempt"], 1);

        let second = orch.retry(&retried).await.unwrap();
        assert_eq!(second.meta["attempt"], 2);
    }

    #[tokio::test]
    async fn replay_reinvokes_handlers_once_per_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(EventKind::LeadCreated, Arc::new(Counting(calls.clone())))
            .build();
        let (orch, tenant, _dir) = setup(registry).await;

        for _ in 0..3 {
            orch.emit(
                &tenant,
                EventKind::LeadCreated,
                serde_json::json!({}),
                "test",
                EventChain::root(),
            )
            .await
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let replayed = orch
            .replay(&tenant, Some(EventKind::LeadCreated), None, 100)
            .await
            .unwrap();
        assert_eq!(replayed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        // Replay copies carry the original correlation and causation chain.
        let all = orch
            .event_log()
            .list_for_replay(&tenant, Some(EventKind::LeadCreated), None, 100)
            .await
            .unwrap();
        assert_eq!(all.len(), 6);
        let copies: Vec<_> = all.iter().filter(|e| e.meta.get("replay_of").is_some()).collect();
        assert_eq!(copies.len(), 3);
        for copy in copies {
            let original_id = copy.meta["replay_of"].as_str().unwrap();
            let original = all.iter().find(|e| e.id == original_id).unwrap();
            assert_eq!(copy.correlation_id, original.correlation_id);
            assert_eq!(copy.causation_id.as_deref(), Some(original_id));
        }
    }
}
