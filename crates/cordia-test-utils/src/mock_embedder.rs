// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedder: identical text always maps to the same unit
//! vector, so similarity assertions are exact.

use async_trait::async_trait;

use cordia_core::error::CordiaError;
use cordia_core::traits::{EmbeddingAdapter, PluginAdapter};
use cordia_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};

pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, CordiaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CordiaError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, CordiaError> {
        let embeddings = input
            .texts
            .iter()
            .map(|text| {
                let bytes = text.as_bytes();
                let mut vector: Vec<f32> = (0..self.dimensions)
                    .map(|i| {
                        let byte = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(1);
                        f32::from(byte) + i as f32
                    })
                    .collect();
                let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    vector.iter_mut().for_each(|x| *x /= norm);
                }
                vector
            })
            .collect();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions,
        })
    }
}
