// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentiment classifier contract used by response-conditional steps.

use crate::types::Sentiment;

/// Classifies inbound reply text as positive, neutral, or negative.
///
/// The classifier is an external collaborator; the sequence engine only
/// depends on this contract. Implementations must be cheap enough to call
/// on every condition evaluation.
pub trait SentimentClassifier: Send + Sync + 'static {
    fn classify(&self, text: &str) -> Sentiment;
}
