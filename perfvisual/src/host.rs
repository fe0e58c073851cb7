//! One-shot host facts for the `systemInfo` row, via sysinfo.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, DiskKind, Disks, MemoryRefreshKind, RefreshKind, System};

use crate::error::HostInfoError;

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub host_name: String,
    pub cpu_model: String,
    pub cpu_cores: Option<u32>,
    pub cpu_threads: u32,
    /// MHz; sysinfo exposes only current frequencies, so this is the lowest core reading.
    pub cpu_base_freq: f64,
    /// MHz; highest current core reading.
    pub cpu_max_freq: f64,
    pub total_memory: u64,
    pub available_memory: u64,
    pub used_memory: u64,
    pub memory_usage: f64,
    pub disk_type: Option<String>,
    pub disk_total: u64,
    pub disk_available: u64,
    pub disk_used: u64,
    pub os_version: String,
    pub command: String,
    pub started_at: DateTime<Local>,
    pub work_dir: PathBuf,
}

/// Collect host facts for a session running `command`, started at `started_at`.
pub fn collect_system_info(
    command: &str,
    started_at: DateTime<Local>,
) -> Result<SystemInfo, HostInfoError> {
    let work_dir = std::env::current_dir().map_err(HostInfoError::CurrentDir)?;

    let sys = System::new_with_specifics(
        RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_frequency())
            .with_memory(MemoryRefreshKind::nothing().with_ram()),
    );

    let cpus = sys.cpus();
    let first = cpus.first().ok_or(HostInfoError::NoCpus)?;
    let cpu_model = first.brand().trim().to_string();
    let freqs = cpus.iter().map(|c| c.frequency() as f64);
    let cpu_base_freq = freqs.clone().fold(f64::INFINITY, f64::min);
    let cpu_max_freq = freqs.fold(0.0, f64::max);

    let total_memory = sys.total_memory();
    let available_memory = sys.available_memory();
    let used_memory = sys.used_memory();
    let memory_usage = if total_memory > 0 {
        crate::rate::round_half_even(
            total_memory.saturating_sub(available_memory) as f64 / total_memory as f64 * 100.0,
            1,
        )
    } else {
        0.0
    };

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| work_dir.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len());
    let (disk_type, disk_total, disk_available) = match disk {
        Some(d) => (
            Some(disk_kind_label(d.kind()).to_string()),
            d.total_space(),
            d.available_space(),
        ),
        None => (None, 0, 0),
    };

    let os_version = match (System::long_os_version(), System::kernel_version()) {
        (Some(os), Some(kernel)) => format!("{os} (kernel {kernel})"),
        (Some(os), None) => os,
        (None, Some(kernel)) => format!("kernel {kernel}"),
        (None, None) => "unknown".to_string(),
    };

    Ok(SystemInfo {
        host_name: System::host_name().unwrap_or_else(|| "unknown".into()),
        cpu_model,
        cpu_cores: System::physical_core_count().map(|n| n as u32),
        cpu_threads: cpus.len() as u32,
        cpu_base_freq: if cpu_base_freq.is_finite() {
            cpu_base_freq
        } else {
            0.0
        },
        cpu_max_freq,
        total_memory,
        available_memory,
        used_memory,
        memory_usage,
        disk_type,
        disk_total,
        disk_available,
        disk_used: disk_total.saturating_sub(disk_available),
        os_version,
        command: command.to_string(),
        started_at,
        work_dir,
    })
}

fn disk_kind_label(kind: DiskKind) -> &'static str {
    match kind {
        DiskKind::HDD => "HDD",
        DiskKind::SSD => "SSD",
        DiskKind::Unknown(_) => "unknown",
    }
}

pub fn display_dir(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_current_host() {
        let started = Local::now();
        let info = collect_system_info("sleep 1", started).expect("host info");
        assert!(info.cpu_threads >= 1);
        assert!(info.total_memory > 0);
        assert!(info.memory_usage >= 0.0 && info.memory_usage <= 100.0);
        assert!(info.cpu_base_freq <= info.cpu_max_freq || info.cpu_max_freq == 0.0);
        assert_eq!(info.command, "sleep 1");
        assert_eq!(info.started_at, started);
        assert_eq!(info.work_dir, std::env::current_dir().expect("cwd"));
        assert_eq!(info.disk_used, info.disk_total - info.disk_available);
    }
}
