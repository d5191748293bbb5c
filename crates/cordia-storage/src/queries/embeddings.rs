// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cold-tier interaction embeddings: f32-LE BLOB vectors with in-process
//! cosine scan, filtered to a single lead.

use cordia_core::CordiaError;
use cordia_core::types::{
    InteractionEmbedding, LeadId, ScoredInteraction, Sentiment, TenantId, blob_to_vec,
    cosine_similarity, vec_to_blob,
};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

const EMBEDDING_COLUMNS: &str = "id, tenant_id, lead_id, message_id, channel, interaction_type, \
     content, embedding, topics, sentiment, interaction_at";

/// Insert an interaction embedding.
///
/// The `message_id` UNIQUE constraint guarantees each message is embedded
/// at most once.
pub async fn insert_embedding(
    db: &Database,
    embedding: &InteractionEmbedding,
) -> Result<(), CordiaError> {
    let embedding = embedding.clone();
    let blob = vec_to_blob(&embedding.vector);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO interaction_embeddings
                     (id, tenant_id, lead_id, message_id, channel, interaction_type,
                      content, embedding, topics, sentiment, interaction_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    embedding.id,
                    embedding.tenant_id.0,
                    embedding.lead_id.0,
                    embedding.message_id,
                    embedding.channel,
                    embedding.interaction_type,
                    embedding.content,
                    blob,
                    serde_json::to_string(&embedding.topics).unwrap_or_else(|_| "[]".into()),
                    embedding.sentiment.map(|s| s.as_str()),
                    embedding.interaction_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether an embedding exists for the given message.
pub async fn has_embedding_for_message(
    db: &Database,
    tenant: &TenantId,
    message_id: &str,
) -> Result<bool, CordiaError> {
    let tenant = tenant.0.clone();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM interaction_embeddings
                 WHERE tenant_id = ?1 AND message_id = ?2",
                params![tenant, message_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Cosine-similarity scan over one lead's embeddings.
///
/// Returns up to `k` hits with similarity `>= threshold` (inclusive), best
/// first. Rows whose stored dimension differs from the query are skipped.
pub async fn similar_interactions(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
    query: &[f32],
    k: usize,
    threshold: f32,
) -> Result<Vec<ScoredInteraction>, CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    let query = query.to_vec();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EMBEDDING_COLUMNS} FROM interaction_embeddings
                 WHERE tenant_id = ?1 AND lead_id = ?2"
            ))?;
            let rows = stmt
                .query_map(params![tenant, lead], row_to_embedding)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut scored: Vec<ScoredInteraction> = rows
                .into_iter()
                .filter(|e| e.vector.len() == query.len())
                .map(|embedding| {
                    let score = cosine_similarity(&query, &embedding.vector);
                    ScoredInteraction { embedding, score }
                })
                .filter(|s| s.score >= threshold)
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(k);
            Ok(scored)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete all embeddings for a lead (GDPR wipe).
pub async fn delete_embeddings(
    db: &Database,
    tenant: &TenantId,
    lead: &LeadId,
) -> Result<(), CordiaError> {
    let tenant = tenant.0.clone();
    let lead = lead.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM interaction_embeddings WHERE tenant_id = ?1 AND lead_id = ?2",
                params![tenant, lead],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_embedding(row: &rusqlite::Row) -> Result<InteractionEmbedding, rusqlite::Error> {
    let blob: Vec<u8> = row.get(7)?;
    let topics: String = row.get(8)?;
    let sentiment: Option<String> = row.get(9)?;
    Ok(InteractionEmbedding {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        lead_id: LeadId(row.get(2)?),
        message_id: row.get(3)?,
        channel: row.get(4)?,
        interaction_type: row.get(5)?,
        content: row.get(6)?,
        vector: blob_to_vec(&blob),
        topics: serde_json::from_str(&topics).unwrap_or_default(),
        sentiment: sentiment.as_deref().map(Sentiment::from_str_value),
        interaction_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_embedding(
        id: &str,
        message_id: &str,
        lead: &str,
        vector: Vec<f32>,
    ) -> InteractionEmbedding {
        InteractionEmbedding {
            id: id.to_string(),
            tenant_id: TenantId("t-1".to_string()),
            lead_id: LeadId(lead.to_string()),
            message_id: message_id.to_string(),
            channel: "whatsapp".to_string(),
            interaction_type: "message".to_string(),
            content: format!("content of {id}"),
            vector,
            topics: vec!["pricing".to_string()],
            sentiment: Some(Sentiment::Neutral),
            interaction_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_query_similar() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        let lead = LeadId("l-1".to_string());

        insert_embedding(&db, &make_embedding("e1", "m1", "l-1", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        insert_embedding(&db, &make_embedding("e2", "m2", "l-1", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();

        let hits = similar_interactions(&db, &tenant, &lead, &[1.0, 0.0, 0.0], 5, 0.7)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding.id, "e1");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        let lead = LeadId("l-1".to_string());

        // cos(45 deg) ~ 0.7071 against [1, 0].
        insert_embedding(&db, &make_embedding("e1", "m1", "l-1", vec![1.0, 1.0]))
            .await
            .unwrap();

        let threshold = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]);
        let at = similar_interactions(&db, &tenant, &lead, &[1.0, 0.0], 5, threshold)
            .await
            .unwrap();
        assert_eq!(at.len(), 1, "similarity exactly at threshold is included");

        let above = similar_interactions(&db, &tenant, &lead, &[1.0, 0.0], 5, threshold + 0.001)
            .await
            .unwrap();
        assert!(above.is_empty(), "similarity below threshold is excluded");
    }

    #[tokio::test]
    async fn query_is_scoped_to_lead() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());

        insert_embedding(&db, &make_embedding("e1", "m1", "l-1", vec![1.0, 0.0]))
            .await
            .unwrap();
        insert_embedding(&db, &make_embedding("e2", "m2", "l-2", vec![1.0, 0.0]))
            .await
            .unwrap();

        let hits = similar_interactions(&db, &tenant, &LeadId("l-1".into()), &[1.0, 0.0], 5, 0.5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding.lead_id.0, "l-1");
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_skipped() {
        let db = setup_db().await;
        let tenant = TenantId("t-1".to_string());
        let lead = LeadId("l-1".to_string());

        insert_embedding(&db, &make_embedding("e1", "m1", "l-1", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        let hits = similar_interactions(&db, &tenant, &lead, &[1.0, 0.0], 5, 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn second_embedding_for_same_message_is_rejected() {
        let db = setup_db().await;
        insert_embedding(&db, &make_embedding("e1", "m1", "l-1", vec![1.0]))
            .await
            .unwrap();
        assert!(
            insert_embedding(&db, &make_embedding("e2", "m1", "l-1", vec![1.0]))
                .await
                .is_err()
        );
        assert!(
            has_embedding_for_message(&db, &TenantId("t-1".into()), "m1")
                .await
                .unwrap()
        );
    }
}
