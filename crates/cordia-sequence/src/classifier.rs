// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic reply-sentiment classification.
//!
//! Scores replies against small positive/negative lexicons with zero cost and
//! zero latency. The thresholds are configurable; anything between them is
//! neutral. Swappable for an LLM-backed classifier through the
//! [`SentimentClassifier`] contract.

use cordia_config::model::SequenceConfig;
use cordia_core::SentimentClassifier;
use cordia_core::types::Sentiment;

/// Positive signals (contains, case-insensitive). German first, the market
/// the original lexicon was built for, plus common English equivalents.
const POSITIVE_SIGNALS: &[&str] = &[
    "ja",
    "gerne",
    "klingt gut",
    "interessant",
    "interessiert",
    "super",
    "perfekt",
    "termin",
    "wann",
    "mehr infos",
    "yes",
    "sure",
    "sounds good",
    "interested",
    "tell me more",
    "let's do it",
    "great",
    "when can we",
];

/// Negative signals (contains, case-insensitive).
const NEGATIVE_SIGNALS: &[&str] = &[
    "nein",
    "kein interesse",
    "nicht interessiert",
    "zu teuer",
    "keine zeit",
    "bitte keine",
    "abmelden",
    "stop",
    "no thanks",
    "not interested",
    "too expensive",
    "unsubscribe",
    "leave me alone",
    "don't contact",
];

/// Strong rejection phrases that settle the classification on their own.
const HARD_NEGATIVE: &[&str] = &["stop", "abmelden", "unsubscribe", "don't contact"];

/// Keyword-scoring classifier with configurable thresholds.
pub struct LexiconClassifier {
    positive_threshold: i32,
    negative_threshold: i32,
}

impl LexiconClassifier {
    /// Thresholds come from `[sequence]` config: at or above
    /// `positive_threshold` is positive, at or below `negative_threshold` is
    /// negative.
    pub fn new(config: &SequenceConfig) -> Self {
        Self {
            positive_threshold: config.positive_threshold,
            negative_threshold: config.negative_threshold,
        }
    }

    fn score(&self, text: &str) -> i32 {
        let lower = text.to_lowercase();
        if HARD_NEGATIVE.iter().any(|s| lower.contains(s)) {
            return self.negative_threshold;
        }
        let mut score = 0;
        for signal in POSITIVE_SIGNALS {
            if lower.contains(signal) {
                score += 1;
            }
        }
        for signal in NEGATIVE_SIGNALS {
            if lower.contains(signal) {
                score -= 1;
            }
        }
        // A question mark is mild engagement.
        if lower.contains('?') {
            score += 1;
        }
        score
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Sentiment {
        let score = self.score(text);
        if score >= self.positive_threshold {
            Sentiment::Positive
        } else if score <= self.negative_threshold {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}
