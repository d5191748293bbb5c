// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation summary windows with optimistic-concurrency checks.

use cordia_core::CordiaError;
use cordia_core::types::{ConversationSummary, LeadId, Sentiment, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const SUMMARY_COLUMNS: &str =
    "id, tenant_id, lead_id, summary, key_facts, sentiment, start_seq, end_seq, created_at";

/// Insert a summary row, enforcing the window rule.
///
/// `start_seq` must equal the prior summary's `end_seq + 1` (or the earliest
/// message seq when no summary exists) and `end_seq` must be strictly
/// greater than the prior `end_seq`. A conflicting window aborts the insert
/// so a racing compaction job loses cleanly.
pub async fn insert_summary(
    db: &Database,
    summary: &ConversationSummary,
) -> Result<(), CordiaError> {
    let summary = summary.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let prev_end: Option<i64> = tx
                .query_row(
                    "SELECT end_seq FROM conversation_summaries
                     WHERE tenant_id = ?1 AND lead_id = ?2
                     ORDER BY end_seq DESC LIMIT 1",
                    params![summary.tenant_id.0, summary.lead_id.0],
                    |row| row.get(0),
                )
                .optional()?;

            let expected_start = match prev_end {
                Some(end) => Some(end + 1),
                None => tx.query_row(
                    "SELECT MIN(seq) FROM messages WHERE tenant_id = ?1 AND lead_id = ?2",
                    params![summary.tenant_id.0, summary.lead_id.0],
                    |row| row.get::<_, Option<i64>>(0),
                )?,
            };

            let window_ok = expected_start == Some(summary.start_seq)
                && prev_end.map(|end| summary.end_seq > end).unwrap_or(true)
                && summary.end_seq >= summary.start_seq;
            if !window_ok {
                return Err(tokio_rusqlite::Error::Other(
                    format!(
                        "summary window conflict for lead {}: got [{}, {}], expected start {:?}",
                        summary.lead_id.0, summary.start_seq, summary.end_seq, expected_start
                    )
                    .into(),
                ));
            }

            tx.execute(
                "INSERT INTO conversation_summaries
                     (id, tenant_id, lead_id, summary, key_facts, sentiment,
                      start_seq, end_seq, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    summary.id,
                    summary.tenant_id.0,
                    summary.lead_id.0,
                    summary.summary,
                    summary.key_facts.to_string(),
                    summary.sentiment.map(|s| s.as_str()),
                    summary.start_seq,
                    summary.end_seq,
                    summary.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent summary for a lead, by window end.
pub async fn latest_summary(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<Option<ConversationSummary>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            let summary = conn
                .query_row(
                    &format!(
                        "SELECT {SUMMARY_COLUMNS} FROM conversation_summaries
                         WHERE tenant_id = ?1 AND lead_id = ?2
                         ORDER BY end_seq DESC LIMIT 1"
                    ),
                    params![tenant, lead],
                    row_to_summary,
                )
                .optional()?;
            Ok(summary)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all summaries for a lead (GDPR wipe).
pub async fn delete_summaries(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM conversation_summaries WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_summary(row: &rusqlite::Row) -> Result<ConversationSummary, rusqlite::Error> {
    let key_facts: String = row.get(4)?;
    let sentiment: Option<String> = row.get(5)?;
    Ok(ConversationSummary {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        lead_id: LeadId(row.get(2)?),
        summary: row.get(3)?,
        key_facts: serde_json::from_str(&key_facts)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        sentiment: sentiment.as_deref().map(Sentiment::from_str_value),
        start_seq: row.get(6)?,
        end_seq: row.get(7)?,
        created_at: row.get(8)?,
    })
}
