//! The monitored subprocess: spawning, liveness, and raw counter reads via sysinfo
//! (plus /proc on Linux for thread and syscall counts).

use once_cell::sync::OnceCell;
use std::process::{Child, Command, ExitStatus};
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::{debug, warn};

use crate::error::{ProcessGone, SpawnError};
use crate::rate::round_half_even;
use crate::types::ProcessCounters;

#[cfg(target_os = "linux")]
use std::fs;

/// What the monitor loop needs from a running process.
pub trait ProcessHandle {
    fn pid(&self) -> u32;

    /// False once the process has exited (or can no longer be waited on).
    fn is_alive(&mut self) -> bool;

    /// Read the current counters. Fails when the process is gone or unreadable.
    fn snapshot_raw(&mut self) -> Result<ProcessCounters, ProcessGone>;

    /// Terminate the process if it is still running and reap it. Safe to call twice.
    fn release(&mut self);
}

// Optional normalization: divide per-process CPU% by logical core count so a process that
// saturates every core reads 100% instead of N*100%. Off by default, matching top/ps.
// Enable with PERFVISUAL_NORMALIZE_CPU=1.
fn normalize_cpu_enabled() -> bool {
    static ON: OnceCell<bool> = OnceCell::new();
    *ON.get_or_init(|| {
        std::env::var("PERFVISUAL_NORMALIZE_CPU")
            .map(|v| v != "0")
            .unwrap_or(false)
    })
}

/// Split a command string on whitespace. No shell, no quoting.
pub fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

/// Start `argv[0]` with the remaining arguments, inheriting stdio. Never goes through a shell.
pub fn spawn(argv: &[String]) -> Result<ChildProcess, SpawnError> {
    let (program, args) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;
    let child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|source| SpawnError::Io {
            program: program.clone(),
            source,
        })?;
    debug!(pid = child.id(), %program, "spawned target");
    Ok(ChildProcess::new(child))
}

/// A spawned child process sampled through a private sysinfo `System`.
pub struct ChildProcess {
    child: Child,
    pid: Pid,
    system: System,
    logical_cpus: usize,
    exit_status: Option<ExitStatus>,
    released: bool,
}

impl ChildProcess {
    fn new(child: Child) -> Self {
        let pid = Pid::from_u32(child.id());
        let mut system =
            System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
        // First refresh establishes the CPU baseline; the first reading will be 0.0.
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());
        let logical_cpus = system.cpus().len().max(1);
        Self {
            child,
            pid,
            system,
            logical_cpus,
            exit_status: None,
            released: false,
        }
    }

    /// Exit status, once the process has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn gone(&self, reason: impl Into<String>) -> ProcessGone {
        ProcessGone {
            pid: self.pid.as_u32(),
            reason: reason.into(),
        }
    }
}

fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_disk_usage()
        .with_tasks()
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid.as_u32()
    }

    fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() || self.released {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = self.pid.as_u32(), %status, "target exited");
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                warn!("cannot wait on pid {}: {e}", self.pid.as_u32());
                false
            }
        }
    }

    fn snapshot_raw(&mut self) -> Result<ProcessCounters, ProcessGone> {
        let pid = self.pid;
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| self.gone("not in process table"))?;

        let raw_cpu = process.cpu_usage() as f64;
        let cpu = if normalize_cpu_enabled() {
            (raw_cpu / self.logical_cpus as f64).clamp(0.0, 100.0)
        } else {
            raw_cpu
        };
        #[cfg_attr(not(target_os = "linux"), allow(unused_mut))]
        let mut counters = ProcessCounters {
            thread_count: process
                .tasks()
                .map(|t| t.len() as u32)
                .filter(|&n| n > 0)
                .unwrap_or(1),
            cpu_percent: round_half_even(cpu, 1),
            memory_bytes: process.memory(),
            io_read_count: 0,
            io_write_count: 0,
            io_read_bytes: process.disk_usage().total_read_bytes,
            io_write_bytes: process.disk_usage().total_written_bytes,
        };

        #[cfg(target_os = "linux")]
        {
            let raw_pid = pid.as_u32();
            if let Some(threads) = read_proc_threads(raw_pid) {
                counters.thread_count = threads;
            }
            match read_proc_io(raw_pid) {
                Some(io) => {
                    counters.io_read_count = io.syscr;
                    counters.io_write_count = io.syscw;
                    counters.io_read_bytes = io.read_bytes;
                    counters.io_write_bytes = io.write_bytes;
                }
                None if !std::path::Path::new(&format!("/proc/{raw_pid}")).exists() => {
                    return Err(self.gone("/proc entry vanished"));
                }
                None => debug!("/proc/{raw_pid}/io unreadable; syscall counts left at 0"),
            }
        }

        Ok(counters)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.exit_status.is_some() {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.exit_status = Some(status);
            return;
        }
        debug!(pid = self.pid.as_u32(), "terminating target");
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => self.exit_status = Some(status),
            Err(e) => warn!("failed to reap pid {}: {e}", self.pid.as_u32()),
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ProcIo {
    pub syscr: u64,
    pub syscw: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Parse `/proc/<pid>/io`. All four fields must be present.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_proc_io(s: &str) -> Option<ProcIo> {
    let (mut syscr, mut syscw, mut rb, mut wb) = (None, None, None, None);
    for line in s.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().parse::<u64>().ok();
        match key.trim() {
            "syscr" => syscr = value,
            "syscw" => syscw = value,
            "read_bytes" => rb = value,
            "write_bytes" => wb = value,
            _ => {}
        }
    }
    Some(ProcIo {
        syscr: syscr?,
        syscw: syscw?,
        read_bytes: rb?,
        write_bytes: wb?,
    })
}

/// `Threads:` line of `/proc/<pid>/status`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_status_threads(s: &str) -> Option<u32> {
    s.lines()
        .find_map(|l| l.strip_prefix("Threads:"))
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(target_os = "linux")]
#[inline]
fn read_proc_io(pid: u32) -> Option<ProcIo> {
    let s = fs::read_to_string(format!("/proc/{pid}/io")).ok()?;
    parse_proc_io(&s)
}

#[cfg(target_os = "linux")]
#[inline]
fn read_proc_threads(pid: u32) -> Option<u32> {
    let s = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_status_threads(&s)
}
