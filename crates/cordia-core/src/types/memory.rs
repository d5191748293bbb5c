// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory-tier types: rolling summaries and interaction embeddings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LeadId, TenantId};
use super::sequence::Sentiment;

/// Rolling compressed memory of a closed window of messages.
///
/// Windows are non-overlapping; `end_seq` is strictly increasing per lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub summary: String,
    pub key_facts: serde_json::Value,
    pub sentiment: Option<Sentiment>,
    /// First message sequence covered by this window.
    pub start_seq: i64,
    /// Last message sequence covered by this window (inclusive).
    pub end_seq: i64,
    pub created_at: DateTime<Utc>,
}

/// A message embedded into the cold semantic index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEmbedding {
    pub id: String,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    /// The originating message; each message is embedded at most once.
    pub message_id: String,
    pub channel: String,
    pub interaction_type: String,
    pub content: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub interaction_at: DateTime<Utc>,
}

/// An interaction embedding with its similarity score from a cold query.
#[derive(Debug, Clone)]
pub struct ScoredInteraction {
    pub embedding: InteractionEmbedding,
    pub score: f32,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Compute cosine similarity between two vectors.
///
/// For L2-normalized vectors this is equivalent to the dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_to_blob_roundtrip() {
        let original = vec![0.1_f32, 0.2, 0.3, -0.5, 1.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), original.len() * 4);
        let recovered = blob_to_vec(&blob);
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn cosine_similarity_identical() {
        let v = vec![0.3_f32, 0.4, 0.5];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-5, "identical vectors should be ~1.0, got {sim}");
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
