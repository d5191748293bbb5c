// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel routing and identity resolution.
//!
//! Inbound vendor webhooks enter through [`InboundPipeline::handle_webhook`]:
//! the channel adapter normalizes the payload, the [`IdentityResolver`]
//! stitches it to a lead (creating a stub per tenant policy), the message
//! lands in memory, and the sequence engine reacts.

pub mod identity;
pub mod pipeline;
pub mod registry;

pub use identity::{IdentityResolver, ResolvedLead};
pub use pipeline::{InboundOutcome, InboundPipeline, LeadCreatedEnrollHandler};
pub use registry::ChannelRegistry;
