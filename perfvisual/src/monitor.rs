//! Monitor loop: liveness -> collect -> derive -> report -> persist -> sleep, until the
//! target exits or a stop is requested.

use chrono::{DateTime, Local};
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::process::ProcessHandle;
use crate::rate::RateEstimator;
use crate::report::ConsoleReporter;
use crate::sampler::{Clock, SampleCollector};
use crate::sink::SampleSink;
use crate::types::{DerivedSample, RawSnapshot};

/// Delta baseline for the next tick. Only ever touched by the loop driver.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub last_snapshot: Option<RawSnapshot>,
    pub last_timestamp: Option<DateTime<Local>>,
}

impl MonitorState {
    /// Record a successfully sampled snapshot as the new baseline.
    pub fn update(&mut self, snap: RawSnapshot) {
        if let Some(prev) = self.last_timestamp {
            if snap.timestamp < prev {
                warn!("sample clock went backwards ({} < {})", snap.timestamp, prev);
            }
        }
        self.last_timestamp = Some(
            self.last_timestamp
                .map_or(snap.timestamp, |t| t.max(snap.timestamp)),
        );
        self.last_snapshot = Some(snap);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The target process exited.
    ProcessExited,
    /// An external stop was requested.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: StopReason,
    pub ticks: u64,
    pub persisted: u64,
    pub dropped_writes: u64,
    pub failed_reads: u64,
    pub lines_printed: u64,
}

pub struct MonitorLoop<P, S, C, W>
where
    P: ProcessHandle,
    S: SampleSink,
    C: Clock,
    W: Write,
{
    handle: P,
    sink: S,
    collector: SampleCollector<C>,
    estimator: RateEstimator,
    reporter: ConsoleReporter<W>,
    interval: Duration,
    state: MonitorState,
    phase: MonitorPhase,
}

impl<P, S, C, W> MonitorLoop<P, S, C, W>
where
    P: ProcessHandle,
    S: SampleSink,
    C: Clock,
    W: Write,
{
    /// Build a loop around an already-spawned process. Spawning is the `Starting` phase;
    /// a spawn failure never reaches this point.
    pub fn new(
        handle: P,
        sink: S,
        collector: SampleCollector<C>,
        estimator: RateEstimator,
        reporter: ConsoleReporter<W>,
        interval: Duration,
    ) -> Self {
        Self {
            handle,
            sink,
            collector,
            estimator,
            reporter,
            interval,
            state: MonitorState::default(),
            phase: MonitorPhase::Starting,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    /// Run one tick. `None` means the process is no longer alive.
    fn tick(&mut self, report: &mut SessionReport) -> Option<()> {
        if !self.handle.is_alive() {
            return None;
        }
        report.ticks += 1;
        let snap = match self.collector.collect(&mut self.handle) {
            Ok(s) => s,
            Err(e) => {
                if !self.handle.is_alive() {
                    // exited between the liveness check and the read
                    debug!("target exited during read: {e}");
                    return None;
                }
                // skipped; the baseline stays on the last good snapshot
                report.failed_reads += 1;
                warn!("sample skipped: {e}");
                return Some(());
            }
        };
        let sample: DerivedSample = self.estimator.derive(self.state.last_snapshot.as_ref(), snap);

        match self.reporter.report(&sample) {
            Ok(true) => report.lines_printed += 1,
            Ok(false) => {}
            Err(e) => debug!("console write failed: {e}"),
        }
        match self.sink.record_sample(&sample) {
            Ok(()) => report.persisted += 1,
            Err(e) => {
                report.dropped_writes += 1;
                warn!("sample at {} not persisted: {e}", sample.timestamp_text());
            }
        }
        self.state.update(snap);
        Some(())
    }

    /// Drive the session to completion. Resources are released once, on the way out.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> SessionReport {
        let mut report = SessionReport {
            reason: StopReason::ProcessExited,
            ticks: 0,
            persisted: 0,
            dropped_writes: 0,
            failed_reads: 0,
            lines_printed: 0,
        };
        if let Err(e) = self.reporter.header() {
            debug!("console write failed: {e}");
        }
        self.phase = MonitorPhase::Running;
        info!(
            pid = self.handle.pid(),
            interval_ms = self.interval.as_millis() as u64,
            negative_rates = ?self.estimator.negative_rates(),
            "monitoring"
        );

        loop {
            if *stop.borrow_and_update() {
                report.reason = StopReason::Cancelled;
                break;
            }
            if self.tick(&mut report).is_none() {
                break;
            }
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = stop_requested(&mut stop) => {
                    report.reason = StopReason::Cancelled;
                    break;
                }
            }
        }

        self.shutdown();
        report
    }

    fn shutdown(&mut self) {
        if self.phase == MonitorPhase::Stopped {
            return;
        }
        self.phase = MonitorPhase::Stopped;
        if let Err(e) = self.sink.close() {
            warn!("closing sink: {e}");
        }
        self.handle.release();
        debug!(last = ?self.state.last_timestamp, "monitor stopped");
    }
}

/// Stop channel that flips to true on Ctrl-C. Call before spawning the target so an
/// interrupt at any point of startup still reaches the loop and the child is reaped.
pub async fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            let _ = tx.send(true);
        }
    });
    // let the listener register its handler before startup continues
    tokio::task::yield_now().await;
    rx
}

/// Resolves once the flag flips to true. A dropped sender means nobody can stop us.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
