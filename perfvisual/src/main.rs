//! Entry point for perfvisual. Parses args, spawns the target, and runs the monitor loop.

use anyhow::Context;
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use perfvisual::args::{parse_args, usage, ParsedArgs, RunArgs, VERSION};
use perfvisual::config::{load_settings, MonitorSettings};
use perfvisual::host::collect_system_info;
use perfvisual::report::ConsoleReporter;
use perfvisual::{
    process, record_host_info, stop_on_ctrl_c, MonitorLoop, RateEstimator, SampleCollector,
    SessionClock, SessionReport, SqliteSink,
};

fn init_tracing() {
    // stdout carries the TSV stream; logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let argv: Vec<String> = env::args().collect();
    let prog = argv
        .first()
        .map(|p| {
            std::path::Path::new(p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.clone())
        })
        .unwrap_or_else(|| "perfvisual".into());

    let run_args = match parse_args(argv) {
        Ok(ParsedArgs::Run(r)) => r,
        Ok(ParsedArgs::Help(text)) => {
            println!("{text}");
            return ExitCode::SUCCESS;
        }
        Ok(ParsedArgs::Version) => {
            println!("perfvisual {VERSION}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}", usage(&prog));
            eprintln!("\n[ERROR]: {e}");
            return ExitCode::from(1);
        }
    };

    match run(run_args).await {
        Ok(report) => {
            info!(
                reason = ?report.reason,
                ticks = report.ticks,
                persisted = report.persisted,
                dropped = report.dropped_writes,
                failed_reads = report.failed_reads,
                "session finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[ERROR]: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<SessionReport> {
    let clock = SessionClock::start();
    let settings = MonitorSettings::resolve(
        &args,
        &load_settings(),
        |k| env::var(k).ok(),
        clock.started_at(),
    );

    let stop_rx = stop_on_ctrl_c().await;

    // Nothing is written until the target is running.
    let child = process::spawn(&args.command.argv)?;

    let mut sink = SqliteSink::open(&settings.db_path)
        .with_context(|| format!("opening {}", settings.db_path.display()))?;
    info!(db = %sink.path().display(), "recording");

    record_host_info(
        &mut sink,
        collect_system_info(&args.command.text, clock.started_at()),
    );

    let monitor = MonitorLoop::new(
        child,
        sink,
        SampleCollector::new(clock),
        RateEstimator::new(settings.negative_rates),
        ConsoleReporter::stdout(settings.report_every),
        settings.interval,
    );
    Ok(monitor.run(stop_rx).await)
}
