// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Cordia follow-up engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Cordia workspace. All adapters implement
//! traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CordiaError;
pub use types::{AdapterType, ChannelType, HealthStatus, LeadId, TenantId};

// Re-export all adapter traits at crate root.
pub use traits::{
    ChannelAdapter, Clock, EmbeddingAdapter, HotCacheAdapter, PluginAdapter, ProviderAdapter,
    SentimentClassifier, StorageAdapter, SystemClock,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_cover_the_taxonomy() {
        let _not_found = CordiaError::not_found("lead", "l-1");
        let _payload = CordiaError::UnparseablePayload {
            channel: "whatsapp".into(),
            detail: "no known shape matched".into(),
        };
        let _storage = CordiaError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _timeout = CordiaError::ChannelTimeout {
            channel: "telegram".into(),
            duration: std::time::Duration::from_secs(10),
        };
        let _rejected = CordiaError::ChannelRejected {
            channel: "telegram".into(),
            reason: "blocked by user".into(),
        };
        let _dim = CordiaError::EmbeddingDimMismatch {
            expected: 384,
            actual: 768,
        };
        let _wipe = CordiaError::WipeIncomplete {
            remaining: vec!["embeddings".into()],
        };
        let _quota = CordiaError::QuotaExceeded("monthly send cap".into());
    }

    #[test]
    fn not_found_renders_entity_and_id() {
        let err = CordiaError::not_found("sequence", "seq-9");
        assert_eq!(err.to_string(), "sequence not found: seq-9");
    }

    #[test]
    fn all_trait_modules_are_exported() {
        // If any trait module is missing or broken, this test won't compile.
        fn _assert_plugin<T: PluginAdapter>() {}
        fn _assert_channel<T: ChannelAdapter>() {}
        fn _assert_provider<T: ProviderAdapter>() {}
        fn _assert_storage<T: StorageAdapter>() {}
        fn _assert_embedding<T: EmbeddingAdapter>() {}
        fn _assert_hot_cache<T: HotCacheAdapter>() {}
        fn _assert_classifier<T: SentimentClassifier>() {}
        fn _assert_clock<T: Clock>() {}
    }
}
