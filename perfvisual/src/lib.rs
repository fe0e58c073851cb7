//! perfvisual: run a command, sample its resource usage on a fixed interval, derive disk
//! throughput, and persist every sample to SQLite while printing a throttled live summary.

pub mod args;
pub mod config;
pub mod error;
pub mod host;
pub mod monitor;
pub mod process;
pub mod rate;
pub mod report;
pub mod sampler;
pub mod sink;
pub mod types;

pub use error::{HostInfoError, ProcessGone, SinkError, SpawnError};
pub use monitor::{
    stop_on_ctrl_c, MonitorLoop, MonitorPhase, MonitorState, SessionReport, StopReason,
};
pub use process::{ChildProcess, ProcessHandle};
pub use rate::{NegativeRates, RateEstimator};
pub use sampler::{Clock, SampleCollector, SessionClock};
pub use sink::{record_host_info, SampleSink, SqliteSink};
pub use types::{DerivedSample, ProcessCounters, RawSnapshot};
