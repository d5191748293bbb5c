// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tick loop: claim due work, gate it, emit `autopilot.action_due`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use cordia_bus::{EventChain, Orchestrator};
use cordia_config::model::SchedulerConfig;
use cordia_core::traits::Clock;
use cordia_core::types::{ChannelType, ContactStatus, EventKind, SequenceState, TenantId};
use cordia_core::{CordiaError, StorageAdapter};
use cordia_sequence::SequenceEngine;

use crate::inflight::InFlightGuard;
use crate::quiet_hours::QuietHours;
use crate::rate_limit::RateLimiter;

/// What one tick did, for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub claimed: usize,
    pub dispatched: usize,
    pub deferred: usize,
    pub dropped: usize,
    pub reactivations: usize,
    pub ghosted: usize,
}

/// Scans for due work per tenant and hands it to the event backbone.
///
/// The dispatcher itself never sends; it emits `autopilot.action_due` events
/// whose handler calls [`SequenceEngine::advance`]. Stale work (lead
/// converted, state stopped) is consulted against the live row and dropped.
pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter>,
    engine: Arc<SequenceEngine>,
    orchestrator: Arc<Orchestrator>,
    quiet_hours: QuietHours,
    rate_limiter: RateLimiter,
    inflight: InFlightGuard,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        engine: Arc<SequenceEngine>,
        orchestrator: Arc<Orchestrator>,
        inflight: InFlightGuard,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            quiet_hours: QuietHours::new(&config),
            rate_limiter: RateLimiter::new(&config, clock.clone()),
            storage,
            engine,
            orchestrator,
            inflight,
            clock,
            config,
        }
    }

    /// One scheduler pass for a tenant.
    pub async fn tick(&self, tenant: &TenantId) -> Result<TickStats, CordiaError> {
        let now = self.clock.now();
        let mut stats = TickStats {
            ghosted: self.engine.ghost_sweep(tenant).await?,
            ..TickStats::default()
        };

        // Claims outlive a few ticks so a crashed worker's rows come back.
        let claim_until = now + Duration::seconds(self.config.tick_secs as i64 * 5);
        let due = self
            .storage
            .claim_due_states(tenant, now, claim_until, self.config.batch_size)
            .await?;
        stats.claimed = due.len();

        for claimed in due {
            self.handle_due_state(tenant, claimed, now, &mut stats).await?;
        }

        for task in self.storage.due_reactivations(tenant, now).await? {
            self.orchestrator
                .emit(
                    tenant,
                    EventKind::ReactivationDue,
                    serde_json::json!({
                        "task_id": task.id,
                        "lead_id": task.lead_id.0,
                        "sequence_id": task.sequence_id,
                        "due_at": task.due_at.to_rfc3339(),
                    }),
                    "scheduler",
                    EventChain::root(),
                )
                .await?;
            stats.reactivations += 1;
        }

        if stats != TickStats::default() {
            debug!(tenant = %tenant, ?stats, "tick complete");
        }
        metrics::counter!("cordia_dispatch_actions").increment(stats.dispatched as u64);
        Ok(stats)
    }

    async fn handle_due_state(
        &self,
        tenant: &TenantId,
        claimed: SequenceState,
        now: DateTime<Utc>,
        stats: &mut TickStats,
    ) -> Result<(), CordiaError> {
        // Consult the live row: the state or lead may have moved since the
        // claim was taken. Stale work is dropped without apology.
        let Some(live) = self.storage.get_sequence_state(tenant, &claimed.id).await? else {
            stats.dropped += 1;
            return Ok(());
        };
        if live.status.is_terminal() {
            stats.dropped += 1;
            return Ok(());
        }
        let Some(lead) = self.storage.get_lead(tenant, &live.lead_id).await? else {
            stats.dropped += 1;
            return Ok(());
        };
        if lead.contact_status == ContactStatus::Converted {
            self.engine.stop(tenant, &live.id).await?;
            debug!(state_id = %live.id, "lead converted, stopping queued work");
            stats.dropped += 1;
            return Ok(());
        }

        if self.quiet_hours.is_quiet(now, &lead.timezone) {
            let open = self.quiet_hours.next_window_open(now, &lead.timezone);
            self.defer(live, open).await?;
            stats.deferred += 1;
            return Ok(());
        }

        if let Some(channel) = self.step_channel(tenant, &live).await? {
            if !self.rate_limiter.try_acquire(tenant, channel) {
                self.defer(live, now + Duration::seconds(self.config.tick_secs as i64))
                    .await?;
                stats.deferred += 1;
                return Ok(());
            }
        }

        let Some(_permit) = self.inflight.try_acquire(tenant, &live.lead_id) else {
            self.defer(live, now + Duration::seconds(self.config.tick_secs as i64))
                .await?;
            stats.deferred += 1;
            return Ok(());
        };

        self.orchestrator
            .emit(
                tenant,
                EventKind::AutopilotActionDue,
                serde_json::json!({
                    "state_id": live.id,
                    "lead_id": live.lead_id.0,
                    "sequence_id": live.sequence_id,
                    "step_index": live.current_step_index,
                }),
                "scheduler",
                EventChain::root(),
            )
            .await?;
        stats.dispatched += 1;
        Ok(())
    }

    /// The channel the state's current step would send on.
    async fn step_channel(
        &self,
        tenant: &TenantId,
        state: &SequenceState,
    ) -> Result<Option<ChannelType>, CordiaError> {
        let sequence = self
            .storage
            .get_sequence(tenant, &state.sequence_id, state.sequence_version)
            .await?;
        Ok(sequence
            .and_then(|s| s.steps.get(state.current_step_index).map(|step| step.channel)))
    }

    /// Push a claimed row's next action out and release the claim.
    async fn defer(&self, mut state: SequenceState, until: DateTime<Utc>) -> Result<(), CordiaError> {
        state.next_action_at = Some(until);
        let expected = state.row_version;
        if !self.storage.update_sequence_state(&state, expected).await? {
            // Someone else already moved the state; their write wins.
            debug!(state_id = %state.id, "defer lost to a concurrent update");
        }
        Ok(())
    }

    /// The periodic loop. Runs one task per process; multiple workers
    /// coordinate through the store's atomic claims.
    pub async fn run(
        self: Arc<Self>,
        tenants: Vec<TenantId>,
        shutdown: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(self.config.tick_secs));
        info!(tenants = tenants.len(), period_secs = self.config.tick_secs, "dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("dispatcher stopped");
                    return;
                }
                _ = tick.tick() => {
                    for tenant in &tenants {
                        if let Err(e) = self.tick(tenant).await {
                            error!(tenant = %tenant, error = %e, "tick failed");
                        }
                    }
                }
            }
        }
    }
}
