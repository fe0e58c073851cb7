//! Persistence of finished samples. The SQLite sink mirrors the two tables the
//! HTML visualizer reads: `systemInfo` (one row per session) and `process_stats` (one per tick).

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HostInfoError, SinkError};
use crate::host::{display_dir, SystemInfo};
use crate::types::{DerivedSample, TIMESTAMP_FORMAT};

/// Consumer of finished records, owned by the session.
pub trait SampleSink {
    fn record_system_info(&mut self, info: &SystemInfo) -> Result<(), SinkError>;

    fn record_sample(&mut self, sample: &DerivedSample) -> Result<(), SinkError>;

    /// Release the underlying resource. Writes after this fail with [`SinkError::Closed`].
    fn close(&mut self) -> Result<(), SinkError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS process_stats (
    timestamp DATETIME,
    threads_num INTEGER,
    cpu_percent FLOAT,
    memory_mb REAL,
    read_count INTEGER,
    write_count INTEGER,
    read_bytes INTEGER,
    write_bytes INTEGER,
    read_mbps FLOAT,
    write_mbps FLOAT
);
CREATE TABLE IF NOT EXISTS systemInfo (
    cpu_model TEXT,
    cpu_cores INTEGER,
    cpu_threads INTEGER,
    cpu_base_freq FLOAT,
    cpu_max_freq FLOAT,
    cpu_cache_size TEXT,
    total_memory INTEGER,
    available_memory INTEGER,
    used_memory INTEGER,
    memory_usage FLOAT,
    disk_type TEXT,
    disk_total INTEGER,
    disk_available INTEGER,
    disk_used INTEGER,
    os_version TEXT,
    command TEXT,
    current_time DATETIME,
    work_dir TEXT,
    host_name TEXT
);
";

/// SQLite columns are signed; counters past i64::MAX saturate.
fn sql_int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

pub struct SqliteSink {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteSink {
    /// Open (or create) the database and make sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        bootstrap(&conn)?;
        debug!(db = %path.display(), "sink ready");
        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection, SinkError> {
        self.conn.as_ref().ok_or(SinkError::Closed)
    }
}

/// Idempotent: safe on a database that already has the tables.
pub fn bootstrap(conn: &Connection) -> Result<(), SinkError> {
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(SinkError::Bootstrap)?;
    debug!(%mode, "journal mode");
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(SinkError::Bootstrap)?;
    conn.execute_batch(SCHEMA).map_err(SinkError::Bootstrap)
}

/// Write the session's `systemInfo` row. Missing host facts or a failed insert are logged;
/// the session records samples either way. Returns whether the row was written.
pub fn record_host_info<S: SampleSink + ?Sized>(
    sink: &mut S,
    host: Result<SystemInfo, HostInfoError>,
) -> bool {
    let info = match host {
        Ok(info) => info,
        Err(e) => {
            warn!("host info unavailable: {e}");
            return false;
        }
    };
    match sink.record_system_info(&info) {
        Ok(()) => true,
        Err(e) => {
            warn!("systemInfo row not written: {e}");
            false
        }
    }
}

impl SampleSink for SqliteSink {
    fn record_system_info(&mut self, info: &SystemInfo) -> Result<(), SinkError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO systemInfo (
                cpu_model, cpu_cores, cpu_threads, cpu_base_freq, cpu_max_freq,
                total_memory, available_memory, used_memory, memory_usage,
                disk_type, disk_total, disk_available, disk_used, os_version,
                command, current_time, work_dir, host_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                info.cpu_model,
                info.cpu_cores,
                info.cpu_threads,
                info.cpu_base_freq,
                info.cpu_max_freq,
                sql_int(info.total_memory),
                sql_int(info.available_memory),
                sql_int(info.used_memory),
                info.memory_usage,
                info.disk_type,
                sql_int(info.disk_total),
                sql_int(info.disk_available),
                sql_int(info.disk_used),
                info.os_version,
                info.command,
                info.started_at.format(TIMESTAMP_FORMAT).to_string(),
                display_dir(&info.work_dir),
                info.host_name,
            ],
        )
        .map_err(|source| SinkError::Write {
            table: "systemInfo",
            source,
        })?;
        Ok(())
    }

    fn record_sample(&mut self, s: &DerivedSample) -> Result<(), SinkError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO process_stats VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                s.timestamp_text(),
                s.raw.thread_count,
                s.raw.cpu_percent,
                s.raw.memory_mb(),
                sql_int(s.raw.io_read_count),
                sql_int(s.raw.io_write_count),
                sql_int(s.raw.io_read_bytes),
                sql_int(s.raw.io_write_bytes),
                s.read_rate_mbps,
                s.write_rate_mbps,
            ],
        )
        .map_err(|source| SinkError::Write {
            table: "process_stats",
            source,
        })?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let conn = self.conn.take().ok_or(SinkError::Closed)?;
        conn.close().map_err(|(_, source)| SinkError::Write {
            table: "(close)",
            source,
        })
    }
}
