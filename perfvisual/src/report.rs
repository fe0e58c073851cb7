//! Live tab-separated summary on stdout, throttled independently of the sampling interval.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::io::{self, Write};
use std::time::Duration;

use crate::types::DerivedSample;

pub const HEADER: &str = "Date\tCPU%\tMemoryMB\tReadMBps\tWriteMBps";

pub const DEFAULT_REPORT_EVERY: Duration = Duration::from_secs(5);

pub struct ConsoleReporter<W> {
    out: W,
    every: ChronoDuration,
    last_printed: Option<DateTime<Local>>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(every: Duration) -> Self {
        Self::new(io::stdout(), every)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, every: Duration) -> Self {
        Self {
            out,
            every: ChronoDuration::from_std(every).unwrap_or(ChronoDuration::MAX),
            last_printed: None,
        }
    }

    pub fn header(&mut self) -> io::Result<()> {
        writeln!(self.out, "{HEADER}")?;
        self.out.flush()
    }

    /// Print `sample` if the report window since the last printed line has passed.
    /// Returns whether a line was written.
    pub fn report(&mut self, sample: &DerivedSample) -> io::Result<bool> {
        let ts = sample.timestamp();
        if let Some(last) = self.last_printed {
            if ts - last < self.every {
                return Ok(false);
            }
        }
        writeln!(self.out, "{}", format_line(sample))?;
        self.out.flush()?;
        self.last_printed = Some(ts);
        Ok(true)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_line(s: &DerivedSample) -> String {
    format!(
        "{}\t{:.1}%\t{:.3}\t{:.3}\t{:.3}",
        s.timestamp_text(),
        s.raw.cpu_percent,
        s.raw.memory_mb(),
        s.read_rate_mbps,
        s.write_rate_mbps
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSnapshot;
    use chrono::TimeZone;

    fn sample_at(offset_ms: i64) -> DerivedSample {
        let base = Local
            .with_ymd_and_hms(2024, 9, 24, 14, 15, 0)
            .single()
            .expect("valid time");
        DerivedSample {
            raw: RawSnapshot {
                timestamp: base + ChronoDuration::milliseconds(offset_ms),
                thread_count: 2,
                cpu_percent: 37.5,
                memory_bytes: 3 * 1024 * 1024 + 512 * 1024,
                io_read_count: 0,
                io_write_count: 0,
                io_read_bytes: 0,
                io_write_bytes: 0,
            },
            read_rate_mbps: 1.953,
            write_rate_mbps: 0.0,
        }
    }

    #[test]
    fn line_layout_is_tab_separated() {
        assert_eq!(
            format_line(&sample_at(250)),
            "2024-09-24 14:15:00.250000\t37.5%\t3.500\t1.953\t0.000"
        );
    }

    #[test]
    fn header_then_throttled_lines() {
        let mut rep = ConsoleReporter::new(Vec::new(), Duration::from_secs(5));
        rep.header().expect("header");
        assert!(rep.report(&sample_at(0)).expect("write"));
        assert!(!rep.report(&sample_at(1_000)).expect("write"));
        assert!(!rep.report(&sample_at(4_999)).expect("write"));
        assert!(rep.report(&sample_at(5_000)).expect("write"));
        assert!(!rep.report(&sample_at(9_000)).expect("write"));
        assert!(rep.report(&sample_at(10_100)).expect("write"));

        let text = String::from_utf8(rep.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("2024-09-24 14:15:00.000000\t"));
        assert!(lines[2].starts_with("2024-09-24 14:15:05.000000\t"));
        assert!(lines[3].starts_with("2024-09-24 14:15:10.100000\t"));
    }
}
