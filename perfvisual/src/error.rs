//! Error taxonomy for a monitoring session.
//!
//! Only [`SpawnError`] aborts a session. The others are per-tick or per-session-row failures
//! that get logged while sampling carries on.

use std::path::PathBuf;
use thiserror::Error;

/// The target command could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no command given")]
    EmptyCommand,
    #[error("failed to start '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The monitored process exited or its counters could not be read.
#[derive(Debug, Error)]
#[error("process {pid} is gone: {reason}")]
pub struct ProcessGone {
    pub pid: u32,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("schema bootstrap failed: {0}")]
    Bootstrap(#[source] rusqlite::Error),
    #[error("write to {table} failed: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sink already closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum HostInfoError {
    #[error("cannot determine working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("no CPUs reported by the OS")]
    NoCpus,
}
