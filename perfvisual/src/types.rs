//! Sample records produced by the monitor loop.
//! Field order mirrors the `process_stats` table.

use chrono::{DateTime, Local};

/// Timestamp layout used on the console and in the database.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Raw OS counters for one process, read in a single refresh.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessCounters {
    pub thread_count: u32,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub io_read_count: u64,
    pub io_write_count: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
}

/// Timestamped counters for one tick. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSnapshot {
    pub timestamp: DateTime<Local>,
    pub thread_count: u32,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub io_read_count: u64,
    pub io_write_count: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
}

impl RawSnapshot {
    pub fn from_counters(timestamp: DateTime<Local>, c: ProcessCounters) -> Self {
        Self {
            timestamp,
            thread_count: c.thread_count,
            cpu_percent: c.cpu_percent,
            memory_bytes: c.memory_bytes,
            io_read_count: c.io_read_count,
            io_write_count: c.io_write_count,
            io_read_bytes: c.io_read_bytes,
            io_write_bytes: c.io_write_bytes,
        }
    }

    /// Resident memory in MiB, rounded to 3 places.
    pub fn memory_mb(&self) -> f64 {
        crate::rate::round_half_even(self.memory_bytes as f64 / BYTES_PER_MB, 3)
    }
}

/// A snapshot plus the I/O throughput derived against the previous tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedSample {
    pub raw: RawSnapshot,
    pub read_rate_mbps: f64,
    pub write_rate_mbps: f64,
}

impl DerivedSample {
    pub fn timestamp(&self) -> DateTime<Local> {
        self.raw.timestamp
    }

    pub fn timestamp_text(&self) -> String {
        self.raw.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
