//! End-to-end tests for the perfvisual binary.
use assert_cmd::prelude::*;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn perfvisual() -> Command {
    let mut cmd = Command::cargo_bin("perfvisual").expect("binary exists");
    // keep a developer's settings file out of the picture
    cmd.env(
        "XDG_CONFIG_HOME",
        std::env::temp_dir().join("perfvisual-tests-no-config"),
    );
    cmd.env_remove("PERFVISUAL_INTERVAL_MS");
    cmd.env_remove("PERFVISUAL_DB_DIR");
    cmd.env_remove("PERFVISUAL_REPORT_SECS");
    cmd.env_remove("PERFVISUAL_NEGATIVE_RATES");
    cmd
}

fn text(out: &std::process::Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

#[test]
fn help_mentions_short_and_long_flags() {
    let out = perfvisual().arg("--help").output().expect("run --help");
    assert!(out.status.success());
    let t = text(&out);
    assert!(
        t.contains("Usage:") && t.contains("--interval") && t.contains("-i") && t.contains("--db"),
        "help text missing expected flags\n{t}"
    );
}

#[test]
fn version_flag_prints_version() {
    let out = perfvisual().arg("--version").output().expect("run --version");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_command_exits_with_one() {
    let out = perfvisual().output().expect("run without args");
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out).contains("[ERROR]"));

    let out = perfvisual()
        .args(["--interval", "abc", "true"])
        .output()
        .expect("run with bad interval");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unstartable_command_exits_with_one_and_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("never.db");
    let out = perfvisual()
        .arg("-o")
        .arg(&db)
        .arg("/no/such/program --flag")
        .output()
        .expect("run perfvisual");
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out).contains("/no/such/program"));
    assert!(!db.exists(), "database created for a command that never started");
}

#[cfg(unix)]
#[test]
fn unopenable_database_stops_the_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("missing").join("dir").join("x.db");
    let started = Instant::now();
    let out = perfvisual()
        .arg("-o")
        .arg(&db)
        .arg("sleep 30")
        .output()
        .expect("run perfvisual");
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out).contains("[ERROR]"));
    // output() returns only once the target let go of the inherited pipes
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "target outlived perfvisual"
    );
    assert!(!db.exists());
}

#[cfg(unix)]
#[test]
fn interrupt_ends_session_and_reaps_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("interrupted.db");
    let started = Instant::now();
    let mut child = perfvisual()
        .args(["-i", "20", "-o"])
        .arg(&db)
        .arg("sleep 30")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn perfvisual");

    std::thread::sleep(Duration::from_millis(300));
    let sent = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(sent.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("wait perfvisual") {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("perfvisual ignored the interrupt");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(status.success(), "exit status {status:?}");
    assert!(started.elapsed() < Duration::from_secs(10));

    let conn = rusqlite::Connection::open(&db).expect("open db");
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM process_stats", [], |r| r.get(0))
        .expect("count rows");
    assert!(rows >= 1);
}

#[cfg(unix)]
#[test]
fn records_a_short_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("session.db");
    let out = perfvisual()
        .args(["-i", "20", "-o"])
        .arg(&db)
        .arg("sleep 0.4")
        .output()
        .expect("run perfvisual");
    assert!(out.status.success(), "perfvisual failed:\n{}", text(&out));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("Date\tCPU%\tMemoryMB\tReadMBps\tWriteMBps"));
    let first = lines.next().expect("first sample is printed immediately");
    assert_eq!(first.split('\t').count(), 5);
    assert!(first.split('\t').nth(1).is_some_and(|c| c.ends_with('%')));

    let conn = rusqlite::Connection::open(&db).expect("open db");
    let info_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM systemInfo", [], |r| r.get(0))
        .expect("count systemInfo");
    assert_eq!(info_rows, 1);
    let command: String = conn
        .query_row("SELECT command FROM systemInfo", [], |r| r.get(0))
        .expect("command");
    assert_eq!(command, "sleep 0.4");

    let mut stmt = conn
        .prepare("SELECT timestamp, threads_num FROM process_stats ORDER BY rowid")
        .expect("prepare");
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert!(rows.len() >= 2, "expected several samples, got {}", rows.len());
    for pair in rows.windows(2) {
        // fixed-width timestamps compare correctly as text
        assert!(pair[1].0 > pair[0].0, "timestamps not increasing: {pair:?}");
    }
    assert!(rows.iter().all(|(_, threads)| *threads >= 1));
}
