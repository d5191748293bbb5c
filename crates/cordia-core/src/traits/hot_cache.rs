// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-FIFO primitives backing the hot memory tier.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CordiaError;

/// List-style KV primitives for the hot message ring.
///
/// Semantics follow the usual list conventions: `lpush` prepends, `lrange`
/// reads inclusive index ranges (negative indices count from the end),
/// `ltrim` keeps a range and drops the rest. Keys carry a TTL set via
/// `expire`. The hot ring is a cache; it must never be treated as the
/// authoritative message order.
#[async_trait]
pub trait HotCacheAdapter: Send + Sync + 'static {
    /// Prepend a value to the list at `key`.
    async fn lpush(&self, key: &str, value: String) -> Result<(), CordiaError>;

    /// Read the inclusive range `[start, stop]`; `-1` means the last element.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, CordiaError>;

    /// Trim the list to the inclusive range `[start, stop]`.
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), CordiaError>;

    /// Set or refresh the key's time-to-live.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CordiaError>;

    /// Delete the key.
    async fn del(&self, key: &str) -> Result<(), CordiaError>;
}
