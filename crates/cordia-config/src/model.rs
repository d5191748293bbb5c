// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Cordia follow-up engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Cordia configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CordiaConfig {
    /// Service identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Hybrid memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Scheduler / dispatcher settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Follow-up sequence engine settings.
    #[serde(default)]
    pub sequence: SequenceConfig,

    /// Identity resolver settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// WhatsApp channel settings.
    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    /// Telegram channel settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Service identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "cordia".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("cordia").join("cordia.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("cordia.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Hybrid memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Hot ring size per lead.
    #[serde(default = "default_n_hot")]
    pub n_hot: usize,

    /// Hot key time-to-live in seconds.
    #[serde(default = "default_t_hot_secs")]
    pub t_hot_secs: u64,

    /// Uncompressed messages before a compaction pass is scheduled.
    #[serde(default = "default_w_warm")]
    pub w_warm: usize,

    /// Cold retrieval top-k.
    #[serde(default = "default_k_cold")]
    pub k_cold: usize,

    /// Minimum cosine similarity for cold hits (inclusive).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Fixed embedding dimension for the tenant's cold index.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Cold query budget; on timeout the cold block is omitted.
    #[serde(default = "default_vector_timeout_ms")]
    pub vector_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            n_hot: default_n_hot(),
            t_hot_secs: default_t_hot_secs(),
            w_warm: default_w_warm(),
            k_cold: default_k_cold(),
            similarity_threshold: default_similarity_threshold(),
            embedding_dimensions: default_embedding_dimensions(),
            vector_timeout_ms: default_vector_timeout_ms(),
        }
    }
}

fn default_n_hot() -> usize {
    10
}

fn default_t_hot_secs() -> u64 {
    3600
}

fn default_w_warm() -> usize {
    40
}

fn default_k_cold() -> usize {
    5
}

fn default_similarity_threshold() -> f64 {
    0.7
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_vector_timeout_ms() -> u64 {
    500
}

/// Scheduler / dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Tick period in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Local hour at which quiet hours begin.
    #[serde(default = "default_quiet_start_hour")]
    pub quiet_start_hour: u32,

    /// Local hour at which quiet hours end.
    #[serde(default = "default_quiet_end_hour")]
    pub quiet_end_hour: u32,

    /// Sustained sends per minute per `(tenant, channel)`.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Token bucket burst capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Maximum due items claimed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            quiet_start_hour: default_quiet_start_hour(),
            quiet_end_hour: default_quiet_end_hour(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            burst: default_burst(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_tick_secs() -> u64 {
    60
}

fn default_quiet_start_hour() -> u32 {
    21
}

fn default_quiet_end_hour() -> u32 {
    8
}

fn default_rate_limit_per_minute() -> u32 {
    20
}

fn default_burst() -> u32 {
    5
}

fn default_batch_size() -> usize {
    50
}

/// Follow-up sequence engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceConfig {
    /// Days in `waiting_response` without inbound before a lead is ghosted.
    #[serde(default = "default_ghost_days")]
    pub ghost_days: i64,

    /// Lower bound of the reactivation window in days.
    #[serde(default = "default_reactivation_min_days")]
    pub reactivation_min_days: i64,

    /// Upper bound of the reactivation window in days.
    #[serde(default = "default_reactivation_max_days")]
    pub reactivation_max_days: i64,

    /// Lexicon classifier score at or above which a reply is positive.
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: i32,

    /// Lexicon classifier score at or below which a reply is negative.
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: i32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            ghost_days: default_ghost_days(),
            reactivation_min_days: default_reactivation_min_days(),
            reactivation_max_days: default_reactivation_max_days(),
            positive_threshold: default_positive_threshold(),
            negative_threshold: default_negative_threshold(),
        }
    }
}

fn default_ghost_days() -> i64 {
    14
}

fn default_reactivation_min_days() -> i64 {
    60
}

fn default_reactivation_max_days() -> i64 {
    90
}

fn default_positive_threshold() -> i32 {
    2
}

fn default_negative_threshold() -> i32 {
    -2
}

/// Policy applied when an inbound identifier matches no known identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdentityPolicy {
    #[default]
    CreateLeadStub,
    EnqueueForManualReview,
    Reject,
}

/// Identity resolver configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// What to do with webhooks from unknown identifiers.
    #[serde(default)]
    pub unknown_policy: UnknownIdentityPolicy,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the completion API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API key. `None` requires an environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed through to the provider.
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// Hard timeout per generation call in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a failed or timed-out call, with jitter.
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            model: default_provider_model(),
            timeout_secs: default_provider_timeout_secs(),
            max_retries: default_provider_max_retries(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_provider_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_provider_max_retries() -> u32 {
    2
}

/// WhatsApp (Meta Cloud API) channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    /// Graph API access token. `None` disables the adapter.
    #[serde(default)]
    pub access_token: Option<String>,

    /// The sending phone number id.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Hard send timeout in seconds.
    #[serde(default = "default_channel_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            timeout_secs: default_channel_timeout_secs(),
        }
    }
}

/// Telegram Bot API channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. `None` disables the adapter.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Hard send timeout in seconds.
    #[serde(default = "default_channel_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            timeout_secs: default_channel_timeout_secs(),
        }
    }
}

fn default_channel_timeout_secs() -> u64 {
    10
}
