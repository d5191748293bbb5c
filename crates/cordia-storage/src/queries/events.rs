// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only event log rows and terminal status transitions.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::types::{Event, EventKind, EventStatus, TenantId, truncate_error};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const EVENT_COLUMNS: &str = "id, tenant_id, type, payload, source, status, correlation_id, \
     causation_id, request_id, meta, created_at, processed_at, error_message";

/// Append an event. The log is insert-only; terminal status transitions are
/// the only mutation.
pub async fn append_event(db: &Database, event: &Event) -> Result<(), CordiaError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO events
                     (id, tenant_id, type, payload, source, status, correlation_id,
                      causation_id, request_id, meta, created_at, processed_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    event.id,
                    event.tenant_id.0,
                    event.kind.as_str(),
                    event.payload.to_string(),
                    event.source,
                    event.status.as_str(),
                    event.correlation_id,
                    event.causation_id,
                    event.request_id,
                    event.meta.to_string(),
                    event.created_at,
                    event.processed_at,
                    event.error_message,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an event by id.
pub async fn get_event(
    db: &Database,
    tenant: &TenantId,
    id: &str,
) -> Result<Option<Event>, CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let event = conn
                .query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 AND id = ?2"),
                    params![tenant, id],
                    row_to_event,
                )
                .optional()?;
            Ok(event)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an event processed. Idempotent: a no-op when already terminal.
pub async fn mark_event_processed(
    db: &Database,
    tenant: &TenantId,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE events SET status = 'processed', processed_at = ?3
                 WHERE tenant_id = ?1 AND id = ?2 AND status = 'pending'",
                params![tenant, id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an event failed with a truncated error message. Idempotent: a no-op
/// when already terminal.
pub async fn mark_event_failed(
    db: &Database,
    tenant: &TenantId,
    id: &str,
    error: &str,
    at: DateTime<Utc>,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let id = id.to_string();
    let error = truncate_error(error);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE events SET status = 'failed', processed_at = ?3, error_message = ?4
                 WHERE tenant_id = ?1 AND id = ?2 AND status = 'pending'",
                params![tenant, id, at, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Events for replay, ascending `created_at`, optionally filtered by type
/// and lower time bound.
pub async fn events_for_replay(
    db: &Database,
    tenant: &TenantId,
    kind: Option<EventKind>,
    since: Option<DateTime<Utc>>,
    limit: usize,
) -> Result<Vec<Event>, CordiaError> {
    let tenant = tenant.0.clone();
    let kind = kind.map(|k| k.as_str().to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE tenant_id = ?1
                   AND (?2 IS NULL OR type = ?2)
                   AND (?3 IS NULL OR created_at >= ?3)
                 ORDER BY created_at ASC LIMIT ?4"
            ))?;
            let events = stmt
                .query_map(params![tenant, kind, since, limit as i64], row_to_event)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_event(row: &rusqlite::Row) -> Result<Event, rusqlite::Error> {
    let kind: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let status: String = row.get(5)?;
    let meta: String = row.get(9)?;
    Ok(Event {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        kind: EventKind::from_str_value(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown event type: {kind}").into(),
            )
        })?,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        source: row.get(4)?,
        status: EventStatus::from_str_value(&status),
        correlation_id: row.get(6)?,
        causation_id: row.get(7)?,
        request_id: row.get(8)?,
        meta: serde_json::from_str(&meta)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        created_at: row.get(10)?,
        processed_at: row.get(11)?,
        error_message: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_event(id: &str, kind: EventKind, at: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            tenant_id: TenantId("t-1".to_string()),
            kind,
            payload: serde_json::json!({"k": "v"}),
            source: "test".to_string(),
            status: EventStatus::Pending,
            correlation_id: id.to_string(),
            causation_id: None,
            request_id: None,
            meta: serde_json::Value::Object(Default::default()),
            created_at: at,
            processed_at: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn append_and_get() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        let event = make_event("e1", EventKind::LeadCreated, Utc::now());
        append_event(&db, &event).await.unwrap();

        let fetched = get_event(&db, &tenant, "e1").await.unwrap().unwrap();
        assert_eq!(fetched.kind, EventKind::LeadCreated);
        assert_eq!(fetched.status, EventStatus::Pending);
        assert_eq!(fetched.correlation_id, "e1");
        assert_eq!(fetched.payload["k"], "v");
    }

    #[tokio::test]
    async fn mark_processed_sets_terminal_state_once() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        append_event(&db, &make_event("e1", EventKind::MessageSent, Utc::now()))
            .await
            .unwrap();

        let t1 = Utc::now();
        mark_event_processed(&db, &tenant, "e1", t1).await.unwrap();
        let after_first = get_event(&db, &tenant, "e1").await.unwrap().unwrap();
        assert_eq!(after_first.status, EventStatus::Processed);
        assert_eq!(after_first.processed_at, Some(t1));

        // Second call is a no-op and must not overwrite processed_at.
        let t2 = t1 + chrono::Duration::minutes(5);
        mark_event_processed(&db, &tenant, "e1", t2).await.unwrap();
        let after_second = get_event(&db, &tenant, "e1").await.unwrap().unwrap();
        assert_eq!(after_second.processed_at, Some(t1));
    }

    #[tokio::test]
    async fn mark_failed_truncates_and_is_idempotent() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        append_event(&db, &make_event("e1", EventKind::SendFailed, Utc::now()))
            .await
            .unwrap();

        let long_error = "boom ".repeat(2000);
        mark_event_failed(&db, &tenant, "e1", &long_error, Utc::now())
            .await
            .unwrap();
        let failed = get_event(&db, &tenant, "e1").await.unwrap().unwrap();
        assert_eq!(failed.status, EventStatus::Failed);
        assert!(failed.error_message.unwrap().len() <= 4000);

        // Marking processed after failed is a no-op.
        mark_event_processed(&db, &tenant, "e1", Utc::now())
            .await
            .unwrap();
        let still_failed = get_event(&db, &tenant, "e1").await.unwrap().unwrap();
        assert_eq!(still_failed.status, EventStatus::Failed);
    }

    #[tokio::test]
    async fn replay_filters_by_kind_and_since() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        let t0 = Utc::now();
        append_event(&db, &make_event("e1", EventKind::LeadCreated, t0))
            .await
            .unwrap();
        append_event(
            &db,
            &make_event(
                "e2",
                EventKind::MessageSent,
                t0 + chrono::Duration::seconds(1),
            ),
        )
        .await
        .unwrap();
        append_event(
            &db,
            &make_event(
                "e3",
                EventKind::LeadCreated,
                t0 + chrono::Duration::seconds(2),
            ),
        )
        .await
        .unwrap();

        let all = events_for_replay(&db, &tenant, None, None, 100).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "e1", "replay must be ascending created_at");

        let created = events_for_replay(&db, &tenant, Some(EventKind::LeadCreated), None, 100)
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let recent = events_for_replay(
            &db,
            &tenant,
            Some(EventKind::LeadCreated),
            Some(t0 + chrono::Duration::seconds(1)),
            100,
        )
        .await
        .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "e3");
    }

    #[tokio::test]
    async fn replay_is_tenant_scoped() {
        let db = setup_db().await;
        append_event(&db, &make_event("e1", EventKind::LeadCreated, Utc::now()))
            .await
            .unwrap();
        let other = events_for_replay(&db, &TenantId("t-2".into()), None, None, 100)
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
