// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./cordia.toml` > `~/.config/cordia/cordia.toml`
//! > `/etc/cordia/cordia.toml` with environment variable overrides via the
//! `CORDIA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CordiaConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/cordia/cordia.toml` (system-wide)
/// 3. `~/.config/cordia/cordia.toml` (user XDG config)
/// 4. `./cordia.toml` (local directory)
/// 5. `CORDIA_*` environment variables
pub fn load_config() -> Result<CordiaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CordiaConfig::default()))
        .merge(Toml::file("/etc/cordia/cordia.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("cordia/cordia.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("cordia.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CordiaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CordiaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CordiaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CordiaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. `CORDIA_TELEGRAM_BOT_TOKEN` must map to
/// `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("CORDIA_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("memory_", "memory.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("sequence_", "sequence.", 1)
            .replacen("identity_", "identity.", 1)
            .replacen("provider_", "provider.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("telegram_", "telegram.", 1);
        mapped.into()
    })
}
