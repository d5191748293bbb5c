// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM integrations.

use async_trait::async_trait;

use crate::error::CordiaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Generation;

/// Adapter for LLM provider integrations.
///
/// The core supplies prompts; the provider is swappable. Prompt wording is
/// owned by the caller, never by the adapter.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Generates a completion for the given prompts.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Generation, CordiaError>;
}
