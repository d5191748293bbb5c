// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quiet-hour gating in the lead's local timezone.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use cordia_config::model::SchedulerConfig;

/// The no-send window, expressed as local wall-clock hours.
///
/// The default 21-8 window wraps midnight; equal start and end hours disable
/// the gate. An unparseable lead timezone falls back to UTC.
#[derive(Debug, Clone, Copy)]
pub struct QuietHours {
    start_hour: u32,
    end_hour: u32,
}

impl QuietHours {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            start_hour: config.quiet_start_hour.min(23),
            end_hour: config.quiet_end_hour.min(23),
        }
    }

    fn zone(timezone: &str) -> Tz {
        timezone.parse().unwrap_or_else(|_| {
            warn!(timezone, "unknown IANA zone, falling back to UTC");
            chrono_tz::UTC
        })
    }

    /// Whether `now` falls inside the lead-local quiet window.
    pub fn is_quiet(&self, now: DateTime<Utc>, timezone: &str) -> bool {
        if self.start_hour == self.end_hour {
            return false;
        }
        let hour = now.with_timezone(&Self::zone(timezone)).hour();
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// The next lead-local instant the window opens (`end_hour:00`).
    pub fn next_window_open(&self, now: DateTime<Utc>, timezone: &str) -> DateTime<Utc> {
        let tz = Self::zone(timezone);
        let local = now.with_timezone(&tz);
        let mut candidate = local
            .date_naive()
            .and_hms_opt(self.end_hour, 0, 0)
            .unwrap_or_else(|| local.naive_local());
        if candidate <= local.naive_local() {
            candidate += Duration::days(1);
        }
        tz.from_local_datetime(&candidate)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // DST gap at the exact opening hour: just push an hour out.
            .unwrap_or(now + Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> QuietHours {
        QuietHours::new(&SchedulerConfig::default())
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 30, 0).unwrap()
    }

    #[test]
    fn default_window_wraps_midnight() {
        let q = quiet();
        assert!(q.is_quiet(at(22), "UTC"));
        assert!(q.is_quiet(at(2), "UTC"));
        assert!(!q.is_quiet(at(9), "UTC"));
        assert!(!q.is_quiet(at(20), "UTC"));
        // Boundary: 21:30 is inside, 08:30 is outside.
        assert!(q.is_quiet(at(21), "UTC"));
        assert!(!q.is_quiet(at(8), "UTC"));
    }

    #[test]
    fn window_follows_the_lead_timezone() {
        let q = quiet();
        // 20:30 UTC is 22:30 in Helsinki during standard time.
        assert!(q.is_quiet(at(20), "Europe/Helsinki"));
        assert!(!q.is_quiet(at(20), "UTC"));
        // 05:30 UTC is still evening in Los Angeles (21:30 the previous day).
        assert!(q.is_quiet(at(5), "America/Los_Angeles"));
    }

    #[test]
    fn next_open_is_the_local_morning_edge() {
        let q = quiet();
        // 22:30 UTC -> next 08:00 UTC the following day.
        let open = q.next_window_open(at(22), "UTC");
        assert_eq!(open, Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).unwrap());
        // 02:30 UTC -> 08:00 the same day.
        let open = q.next_window_open(at(2), "UTC");
        assert_eq!(open, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn equal_hours_disable_the_gate() {
        let q = QuietHours::new(&SchedulerConfig {
            quiet_start_hour: 0,
            quiet_end_hour: 0,
            ..SchedulerConfig::default()
        });
        assert!(!q.is_quiet(at(3), "UTC"));
    }

    #[test]
    fn bad_timezone_falls_back_to_utc() {
        let q = quiet();
        assert!(q.is_quiet(at(23), "Mars/Olympus_Mons"));
    }
}
