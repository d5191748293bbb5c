// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manually advanced clock for deterministic scheduling tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use cordia_core::traits::Clock;

/// A clock that only moves when told to.
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Starts at a fixed weekday mid-morning, safely outside quiet hours.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
