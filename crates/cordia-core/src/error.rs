// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Cordia follow-up engine.

use thiserror::Error;

/// The primary error type used across all Cordia adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CordiaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A lead, sequence, event, or other entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Webhook payload did not match any known vendor shape for the channel.
    #[error("unparseable {channel} payload: {detail}")]
    UnparseablePayload { channel: String, detail: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel send did not complete within the hard timeout.
    #[error("{channel} send timed out after {duration:?}")]
    ChannelTimeout {
        channel: String,
        duration: std::time::Duration,
    },

    /// Channel vendor rejected the send.
    #[error("{channel} rejected send: {reason}")]
    ChannelRejected { channel: String, reason: String },

    /// Channel vendor is unreachable.
    #[error("{channel} unavailable")]
    ChannelUnavailable {
        channel: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An embedding vector did not match the index dimension for the tenant.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },

    /// Raised by an external collaborator; surfaced unchanged.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A GDPR wipe left data behind in one or more subsystems.
    #[error("wipe incomplete, remaining subsystems: {remaining:?}")]
    WipeIncomplete { remaining: Vec<String> },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CordiaError {
    /// Shorthand for a [`CordiaError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CordiaError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
