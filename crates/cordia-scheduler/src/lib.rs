// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler / dispatcher: the timed side of the follow-up engine.
//!
//! Every tick claims due sequence states and reactivation tasks, gates each
//! item on quiet hours, per-channel rate limits, and the per-lead in-flight
//! guard, and emits `autopilot.action_due` events whose handlers advance the
//! state machine. Claims are atomic so concurrent workers never double-pick.

pub mod dispatcher;
pub mod handlers;
pub mod inflight;
pub mod quiet_hours;
pub mod rate_limit;

pub use dispatcher::{Dispatcher, TickStats};
pub use handlers::{ActionDueHandler, ReactivationDueHandler};
pub use inflight::{InFlightGuard, InFlightPermit};
pub use quiet_hours::QuietHours;
pub use rate_limit::RateLimiter;
