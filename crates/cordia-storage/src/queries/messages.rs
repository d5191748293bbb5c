// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message inserts and window queries.
//!
//! Messages are immutable; the `seq` column is the authoritative per-lead
//! order and the coordinate system for summary windows.

use chrono::{DateTime, Utc};
use cordia_core::CordiaError;
use cordia_core::types::{ChannelType, Direction, LeadId, Message, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const MESSAGE_COLUMNS: &str = "seq, id, tenant_id, lead_id, channel, direction, content, \
     content_type, event_id, meta, created_at";

/// Insert a message and return its assigned sequence number.
pub async fn insert_message(db: &Database, message: &Message) -> Result<i64, CordiaError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages
                     (id, tenant_id, lead_id, channel, direction, content, content_type,
                      event_id, meta, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    message.id,
                    message.tenant_id.0,
                    message.lead_id.0,
                    message.channel.as_str(),
                    message.direction.as_str(),
                    message.content,
                    message.content_type,
                    message.event_id,
                    message.meta.to_string(),
                    message.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent messages for a lead, newest first.
pub async fn recent_messages(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    limit: usize,
) -> Result<Vec<Message>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND lead_id = ?2
                 ORDER BY seq DESC LIMIT ?3"
            ))?;
            let messages = stmt
                .query_map(params![tenant, lead, limit as i64], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages with `seq > after_seq`, ascending, capped at `limit`.
pub async fn messages_after_seq(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    after_seq: i64,
    limit: usize,
) -> Result<Vec<Message>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND lead_id = ?2 AND seq > ?3
                 ORDER BY seq ASC LIMIT ?4"
            ))?;
            let messages = stmt
                .query_map(
                    params![tenant, lead, after_seq, limit as i64],
                    row_to_message,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of messages with `seq > after_seq` for a lead.
pub async fn count_messages_after(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    after_seq: i64,
) -> Result<i64, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE tenant_id = ?1 AND lead_id = ?2 AND seq > ?3",
                params![tenant, lead, after_seq],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent inbound message created at or after `since`.
pub async fn latest_inbound_since(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    since: DateTime<Utc>,
) -> Result<Option<Message>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let message = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE tenant_id = ?1 AND lead_id = ?2
                           AND direction = 'inbound' AND created_at >= ?3
                         ORDER BY seq DESC LIMIT 1"
                    ),
                    params![tenant, lead, since],
                    row_to_message,
                )
                .optional()?;
            Ok(message)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all messages for a lead. GDPR wipe only; messages are otherwise
/// immutable.
pub async fn delete_messages(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM messages WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub(crate) fn row_to_message(row: &rusqlite::Row) -> Result<Message, rusqlite::Error> {
    let channel: String = row.get(4)?;
    let direction: String = row.get(5)?;
    let meta: String = row.get(9)?;
    Ok(Message {
        seq: row.get(0)?,
        id: row.get(1)?,
        tenant_id: TenantId(row.get(2)?),
        lead_id: LeadId(row.get(3)?),
        channel: ChannelType::from_str_value(&channel).unwrap_or(ChannelType::Whatsapp),
        direction: Direction::from_str_value(&direction),
        content: row.get(6)?,
        content_type: row.get(7)?,
        event_id: row.get(8)?,
        meta: serde_json::from_str(&meta)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        created_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::leads::create_lead;
    use cordia_core::types::Lead;

    async fn setup_db_with_lead() -> (Database, TenantId, LeadId) {
        let db = Database::open_in_memory().await.unwrap();
        let tenant = TenantId("t-1".to_string());
        let lead_id = LeadId("l-1".to_string());
        let lead = Lead::stub(
            lead_id.clone(),
            tenant.clone(),
            "Test",
            ChannelType::Whatsapp,
            Utc::now(),
        );
        create_lead(&db, &lead).await.unwrap();
        (db, tenant, lead_id)
    }

    fn make_msg(
        id: &str,
        tenant: &TenantId,
        lead: &LeadId,
        direction: Direction,
        content: &str,
        at: DateTime<Utc>,
    ) -> Message {
        Message {
            seq: 0,
            id: id.to_string(),
            tenant_id: tenant.clone(),
            lead_id: lead.clone(),
            channel: ChannelType::Whatsapp,
            direction,
            content: content.to_string(),
            content_type: "text".to_string(),
            event_id: None,
            meta: serde_json::Value::Object(Default::default()),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_seq() {
        let (db, tenant, lead) = setup_db_with_lead().await;
        let now = Utc::now();

        let s1 = insert_message(&db, &make_msg("m1", &tenant, &lead, Direction::Inbound, "a", now))
            .await
            .unwrap();
        let s2 = insert_message(&db, &make_msg("m2", &tenant, &lead, Direction::Outbound, "b", now))
            .await
            .unwrap();
        assert!(s2 > s1, "seq must be monotonically increasing");
    }

    #[tokio::test]
    async fn recent_messages_newest_first() {
        let (db, tenant, lead) = setup_db_with_lead().await;
        let now = Utc::now();
        for i in 0..5 {
            let msg = make_msg(
                &format!("m{i}"),
                &tenant,
                &lead,
                Direction::Inbound,
                &format!("msg {i}"),
                now,
            );
            insert_message(&db, &msg).await.unwrap();
        }

        let recent = recent_messages(&db, &tenant, &lead, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "m4");
        assert_eq!(recent[2].id, "m2");
    }

    #[tokio::test]
    async fn window_queries_use_seq() {
        let (db, tenant, lead) = setup_db_with_lead().await;
        let now = Utc::now();
        let mut seqs = Vec::new();
        for i in 0..4 {
            let msg = make_msg(
                &format!("m{i}"),
                &tenant,
                &lead,
                Direction::Inbound,
                "x",
                now,
            );
            seqs.push(insert_message(&db, &msg).await.unwrap());
        }

        let after = messages_after_seq(&db, &tenant, &lead, seqs[1], 10)
            .await
            .unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].id, "m2");

        let count = count_messages_after(&db, &tenant, &lead, seqs[1])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(count_messages_after(&db, &tenant, &lead, 0).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn latest_inbound_since_skips_outbound() {
        let (db, tenant, lead) = setup_db_with_lead().await;
        let t0 = Utc::now();
        insert_message(&db, &make_msg("m1", &tenant, &lead, Direction::Inbound, "early", t0))
            .await
            .unwrap();
        insert_message(
            &db,
            &make_msg(
                "m2",
                &tenant,
                &lead,
                Direction::Outbound,
                "our follow-up",
                t0 + chrono::Duration::minutes(5),
            ),
        )
        .await
        .unwrap();

        let since = t0 + chrono::Duration::minutes(1);
        let found = latest_inbound_since(&db, &tenant, &lead, since).await.unwrap();
        assert!(found.is_none(), "only the outbound message is after `since`");

        insert_message(
            &db,
            &make_msg(
                "m3",
                &tenant,
                &lead,
                Direction::Inbound,
                "a reply",
                t0 + chrono::Duration::minutes(10),
            ),
        )
        .await
        .unwrap();
        let found = latest_inbound_since(&db, &tenant, &lead, since).await.unwrap();
        assert_eq!(found.unwrap().id, "m3");
    }
}
