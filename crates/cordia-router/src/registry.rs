// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter registry, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use cordia_core::types::{ChannelType, StandardMessage};
use cordia_core::{ChannelAdapter, CordiaError};

/// Immutable map from channel type to its adapter.
#[derive(Default)]
pub struct ChannelRegistry {
    adapters: HashMap<ChannelType, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration at startup.
    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    pub fn get(&self, channel: ChannelType) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel)
    }

    /// A clone of the adapter map, for collaborators that dispatch sends.
    pub fn adapters(&self) -> HashMap<ChannelType, Arc<dyn ChannelAdapter>> {
        self.adapters.clone()
    }

    /// Normalize a raw webhook through the channel's adapter.
    pub fn normalize(
        &self,
        channel: ChannelType,
        raw: &serde_json::Value,
    ) -> Result<StandardMessage, CordiaError> {
        let adapter = self
            .get(channel)
            .ok_or_else(|| CordiaError::ChannelUnavailable {
                channel: channel.as_str().to_string(),
                source: None,
            })?;
        adapter.normalize(raw)
    }
}
