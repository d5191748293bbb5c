// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of configuration values.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::CordiaConfig;

/// A single configuration validation error.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid config value for `{field}`: {message}")]
pub struct ConfigError {
    /// Dotted config key, e.g. `memory.similarity_threshold`.
    pub field: String,
    pub message: String,
    #[help]
    pub help: Option<String>,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>, help: Option<&str>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            help: help.map(str::to_string),
        }
    }
}

/// Validate ranges and cross-field constraints.
///
/// Returns all violations at once so operators fix their config in one pass.
pub fn validate_config(config: &CordiaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.memory.n_hot == 0 {
        errors.push(ConfigError::new(
            "memory.n_hot",
            "hot ring size must be at least 1",
            None,
        ));
    }
    if !(0.0..=1.0).contains(&config.memory.similarity_threshold) {
        errors.push(ConfigError::new(
            "memory.similarity_threshold",
            format!(
                "cosine threshold must be within [0.0, 1.0], got {}",
                config.memory.similarity_threshold
            ),
            None,
        ));
    }
    if config.memory.embedding_dimensions == 0 {
        errors.push(ConfigError::new(
            "memory.embedding_dimensions",
            "embedding dimension must be positive",
            None,
        ));
    }
    if config.memory.w_warm == 0 {
        errors.push(ConfigError::new(
            "memory.w_warm",
            "compaction window must be at least 1 message",
            None,
        ));
    }

    if config.scheduler.tick_secs == 0 {
        errors.push(ConfigError::new(
            "scheduler.tick_secs",
            "tick period must be positive",
            None,
        ));
    }
    if config.scheduler.quiet_start_hour > 23 {
        errors.push(ConfigError::new(
            "scheduler.quiet_start_hour",
            format!("hour must be 0-23, got {}", config.scheduler.quiet_start_hour),
            None,
        ));
    }
    if config.scheduler.quiet_end_hour > 23 {
        errors.push(ConfigError::new(
            "scheduler.quiet_end_hour",
            format!("hour must be 0-23, got {}", config.scheduler.quiet_end_hour),
            None,
        ));
    }
    if config.scheduler.rate_limit_per_minute == 0 {
        errors.push(ConfigError::new(
            "scheduler.rate_limit_per_minute",
            "rate limit must be positive",
            Some("set a high value instead of 0 to effectively disable rate limiting"),
        ));
    }

    if config.sequence.ghost_days <= 0 {
        errors.push(ConfigError::new(
            "sequence.ghost_days",
            "ghost threshold must be positive",
            None,
        ));
    }
    if config.sequence.reactivation_min_days > config.sequence.reactivation_max_days {
        errors.push(ConfigError::new(
            "sequence.reactivation_min_days",
            format!(
                "window lower bound {} exceeds upper bound {}",
                config.sequence.reactivation_min_days, config.sequence.reactivation_max_days
            ),
            None,
        ));
    }
    if config.sequence.negative_threshold >= config.sequence.positive_threshold {
        errors.push(ConfigError::new(
            "sequence.negative_threshold",
            "negative threshold must be below the positive threshold",
            None,
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&CordiaConfig::default()).is_ok());
    }

    #[test]
    fn bad_similarity_threshold_is_rejected() {
        let mut config = CordiaConfig::default();
        config.memory.similarity_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "memory.similarity_threshold"));
    }

    #[test]
    fn inverted_reactivation_window_is_rejected() {
        let mut config = CordiaConfig::default();
        config.sequence.reactivation_min_days = 90;
        config.sequence.reactivation_max_days = 60;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sequence.reactivation_min_days");
    }

    #[test]
    fn all_violations_reported_at_once() {
        let mut config = CordiaConfig::default();
        config.memory.n_hot = 0;
        config.scheduler.tick_secs = 0;
        config.sequence.ghost_days = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
