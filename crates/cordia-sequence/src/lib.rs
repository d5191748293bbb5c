// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up sequence state machine.
//!
//! Advances each enrolled lead through an ordered sequence of steps with
//! per-step delays, response-conditional branching, exponential holds,
//! ghosting, and scheduled reactivation. Step execution is idempotent under
//! retry through persisted dedup records.

pub mod classifier;
pub mod engine;
pub mod template;

pub use classifier::LexiconClassifier;
pub use engine::{AdvanceOutcome, SequenceEngine};
pub use template::{StaticTemplates, TemplateRenderer};
