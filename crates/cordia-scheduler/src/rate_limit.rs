// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token buckets keyed by `(tenant, channel)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use cordia_config::model::SchedulerConfig;
use cordia_core::traits::Clock;
use cordia_core::types::{ChannelType, TenantId};

struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Per-tenant, per-channel send rate limiting.
///
/// Refill reads the injected [`Clock`], so tests advance time instead of
/// sleeping. A fresh bucket starts at full burst capacity.
pub struct RateLimiter {
    buckets: DashMap<(String, ChannelType), Bucket>,
    rate_per_sec: f64,
    burst: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            rate_per_sec: f64::from(config.rate_limit_per_minute) / 60.0,
            burst: f64::from(config.burst.max(1)),
            clock,
        }
    }

    /// Consume one token; `false` means the bucket is empty and the caller
    /// defers the send.
    pub fn try_acquire(&self, tenant: &TenantId, channel: ChannelType) -> bool {
        let now = self.clock.now();
        let mut bucket = self
            .buckets
            .entry((tenant.0.clone(), channel))
            .or_insert_with(|| Bucket {
                tokens: self.burst,
                last_refill: now,
            });
        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
