//! Settings: optional JSON defaults file, environment overrides, then command-line flags.
//! File lives at $XDG_CONFIG_HOME/perfvisual/settings.json (fallback ~/.config/perfvisual/settings.json).

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::warn;

use crate::args::RunArgs;
use crate::rate::NegativeRates;
use crate::report::DEFAULT_REPORT_EVERY;

pub const DEFAULT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_every_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_rates: Option<NegativeRates>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("perfvisual")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("perfvisual")
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> SettingsFile {
    load_settings_from(&settings_path())
}

/// Missing file means defaults; a malformed one is reported and ignored.
pub fn load_settings_from(path: &Path) -> SettingsFile {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!("ignoring malformed settings {}: {e}", path.display());
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

/// Fully resolved options for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub report_every: Duration,
    pub db_path: PathBuf,
    pub negative_rates: NegativeRates,
}

/// `<YYYYmmdd_HH.MM.SS>.db`, named after the session start.
pub fn default_db_name(now: DateTime<Local>) -> String {
    format!("{}.db", now.format("%Y%m%d_%H.%M.%S"))
}

fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw}: not a valid value");
            None
        }
    }
}

impl MonitorSettings {
    /// Resolve CLI > environment > settings file > defaults. `env` is usually
    /// `|k| std::env::var(k).ok()`.
    pub fn resolve(
        cli: &RunArgs,
        file: &SettingsFile,
        env: impl Fn(&str) -> Option<String>,
        now: DateTime<Local>,
    ) -> Self {
        let interval_ms = cli
            .interval_ms
            .or_else(|| env_parse(&env, "PERFVISUAL_INTERVAL_MS"))
            .or(file.interval_ms)
            .unwrap_or(DEFAULT_INTERVAL_MS)
            .max(1);

        let report_every = cli
            .report_every_secs
            .or_else(|| env_parse(&env, "PERFVISUAL_REPORT_SECS"))
            .or(file.report_every_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REPORT_EVERY);

        let negative_rates = if cli.clamp_negative {
            NegativeRates::Clamp
        } else {
            env_parse(&env, "PERFVISUAL_NEGATIVE_RATES")
                .or(file.negative_rates)
                .unwrap_or_default()
        };

        let db_path = match &cli.db {
            Some(p) => p.clone(),
            None => {
                let dir = env("PERFVISUAL_DB_DIR")
                    .map(PathBuf::from)
                    .or_else(|| file.db_dir.clone())
                    .unwrap_or_else(|| PathBuf::from("."));
                dir.join(default_db_name(now))
            }
        };

        Self {
            interval: Duration::from_millis(interval_ms),
            report_every,
            db_path,
            negative_rates,
        }
    }
}
