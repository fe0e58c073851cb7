//! Sampler: one timestamped raw snapshot per tick.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::time::Instant;

use crate::error::ProcessGone;
use crate::process::ProcessHandle;
use crate::types::RawSnapshot;

/// Source of sample timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall time captured once at session start, advanced by the monotonic clock.
///
/// Timestamps read like wall-clock time but never go backwards when the system clock is
/// adjusted mid-session.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    wall_anchor: DateTime<Local>,
    mono_anchor: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            wall_anchor: Local::now(),
            mono_anchor: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.wall_anchor
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for SessionClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = self.mono_anchor.elapsed();
        let delta = ChronoDuration::from_std(elapsed).unwrap_or(ChronoDuration::MAX);
        self.wall_anchor
            .checked_add_signed(delta)
            .unwrap_or(self.wall_anchor)
    }
}

/// Reads a [`ProcessHandle`] and stamps the result. Holds no per-tick state.
#[derive(Debug, Clone)]
pub struct SampleCollector<C> {
    clock: C,
}

impl<C: Clock> SampleCollector<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn collect<P: ProcessHandle + ?Sized>(
        &self,
        handle: &mut P,
    ) -> Result<RawSnapshot, ProcessGone> {
        let counters = handle.snapshot_raw()?;
        // stamp immediately after the read
        let timestamp = self.clock.now();
        Ok(RawSnapshot::from_counters(timestamp, counters))
    }
}
