// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for stamping diagnostic events

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock measuring time elapsed since its own origin
pub trait Clock: Clone + Send + Sync + 'static {
    fn elapsed(&self) -> Duration;
}

/// Monotonic wall clock, origin at construction
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock for deterministic traces in tests
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    current: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for FakeClock {
    fn elapsed(&self) -> Duration {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
