// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Cordia subsystems.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod channel;
pub mod event;
pub mod ids;
pub mod lead;
pub mod memory;
pub mod message;
pub mod sequence;

pub use channel::{
    ChannelCapabilities, ChannelType, MessageContent, OutboundEnvelope, SendReceipt,
    StandardMessage,
};
pub use event::{Event, EventKind, EventStatus, MAX_ERROR_MESSAGE_LEN, truncate_error};
pub use ids::{LeadId, TenantId};
pub use lead::{ChannelIdentity, ContactStatus, Lead};
pub use memory::{
    ConversationSummary, InteractionEmbedding, ScoredInteraction, blob_to_vec, cosine_similarity,
    vec_to_blob,
};
pub use message::{Direction, Message};
pub use sequence::{
    FollowUpSequence, FollowUpStep, ReactivationTask, Sentiment, SequenceState, SequenceStatus,
    StepAttempt, StepCondition,
};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Embedding,
    HotCache,
    Classifier,
}

/// A single LLM generation with token accounting.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}
