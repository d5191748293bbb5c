// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event backbone: durable domain-event log, handler registry, orchestrator.
//!
//! Every domain fact is appended to the log as a [`cordia_core::types::Event`]
//! with correlation/causation chaining. The orchestrator dispatches pending
//! events to registered handlers with at-most-once semantics per event;
//! recovery happens through retry and replay, which append fresh events
//! rather than re-running terminal ones.

pub mod log;
pub mod orchestrator;
pub mod registry;

pub use log::{EventChain, EventLog};
pub use orchestrator::Orchestrator;
pub use registry::{EventHandler, HandlerRegistry, HandlerRegistryBuilder};
