// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for messaging platform integrations.

use async_trait::async_trait;

use crate::error::CordiaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelCapabilities, ChannelType, OutboundEnvelope, SendReceipt, StandardMessage,
};

/// Adapter for a single messaging channel.
///
/// Channel adapters normalize inbound vendor webhooks into the
/// channel-independent [`StandardMessage`] and translate outbound envelopes
/// into vendor API calls. Adapters are stateless apart from configured
/// authentication tokens.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// The channel this adapter serves.
    fn channel(&self) -> ChannelType;

    /// Returns the capabilities supported by this channel.
    fn capabilities(&self) -> ChannelCapabilities;

    /// Normalizes a raw vendor webhook payload.
    ///
    /// Adapters must try every vendor payload shape they know for their
    /// channel before failing with [`CordiaError::UnparseablePayload`].
    fn normalize(&self, raw: &serde_json::Value) -> Result<StandardMessage, CordiaError>;

    /// Sends an outbound envelope, blocking up to the configured hard timeout.
    async fn send(
        &self,
        recipient: &str,
        envelope: &OutboundEnvelope,
    ) -> Result<SendReceipt, CordiaError>;
}
