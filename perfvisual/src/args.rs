//! Command-line parsing. Kept free of I/O so it can be tested directly.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::split_command;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--interval MS|-i MS] [--db PATH|-o PATH] [--report-every SECS] [--clamp-negative] \"<command>\"\n       {prog} [options] -- <program> [args...]\n\n\
         Runs <command> (split on whitespace, no shell) and samples its CPU, memory, threads and\n\
         disk I/O every MS milliseconds (default 100). Every sample goes to a SQLite database;\n\
         a tab-separated summary is printed to stdout at most once per report window (default 5s)."
    )
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("{0}")]
    Usage(String),
    #[error("invalid value '{value}' for {flag}")]
    BadValue { flag: &'static str, value: String },
    #[error("missing value for {0}")]
    MissingValue(&'static str),
}

/// The command to monitor: the text recorded in `systemInfo` and the argv actually run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub text: String,
    pub argv: Vec<String>,
}

impl CommandSpec {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            argv: split_command(text),
        }
    }

    pub fn from_argv(argv: Vec<String>) -> Self {
        Self {
            text: argv.join(" "),
            argv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub interval_ms: Option<u64>,
    pub db: Option<PathBuf>,
    pub report_every_secs: Option<u64>,
    pub clamp_negative: bool,
    pub command: CommandSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedArgs {
    Run(RunArgs),
    Help(String),
    Version,
}

fn parse_interval(v: &str) -> Result<u64, ArgsError> {
    match v.parse::<u64>() {
        Ok(ms) if ms >= 1 => Ok(ms),
        _ => Err(ArgsError::BadValue {
            flag: "--interval",
            value: v.to_string(),
        }),
    }
}

fn parse_secs(v: &str) -> Result<u64, ArgsError> {
    v.parse::<u64>().map_err(|_| ArgsError::BadValue {
        flag: "--report-every",
        value: v.to_string(),
    })
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ArgsError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "perfvisual".into());
    let mut interval_ms: Option<u64> = None;
    let mut db: Option<PathBuf> = None;
    let mut report_every_secs: Option<u64> = None;
    let mut clamp_negative = false;
    let mut positional: Vec<String> = Vec::new();
    let mut explicit_argv: Option<Vec<String>> = None;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParsedArgs::Help(usage(&prog))),
            "--version" => return Ok(ParsedArgs::Version),
            "--interval" | "-i" => {
                let v = it.next().ok_or(ArgsError::MissingValue("--interval"))?;
                interval_ms = Some(parse_interval(&v)?);
            }
            "--db" | "-o" => {
                let v = it.next().ok_or(ArgsError::MissingValue("--db"))?;
                db = Some(PathBuf::from(v));
            }
            "--report-every" => {
                let v = it.next().ok_or(ArgsError::MissingValue("--report-every"))?;
                report_every_secs = Some(parse_secs(&v)?);
            }
            "--clamp-negative" => clamp_negative = true,
            "--" => {
                explicit_argv = Some(it.by_ref().collect());
            }
            _ if arg.starts_with("--interval=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    interval_ms = Some(parse_interval(v)?);
                }
            }
            _ if arg.starts_with("--db=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        db = Some(PathBuf::from(v));
                    }
                }
            }
            _ if arg.starts_with("--report-every=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    report_every_secs = Some(parse_secs(v)?);
                }
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(ArgsError::Usage(format!("unknown option '{arg}'")));
            }
            _ => positional.push(arg),
        }
    }

    let command = match (explicit_argv, positional.len()) {
        (Some(argv), 0) if !argv.is_empty() => CommandSpec::from_argv(argv),
        (Some(_), _) => {
            return Err(ArgsError::Usage(
                "give either a quoted command string or a program after '--', not both".into(),
            ))
        }
        (None, 1) => CommandSpec::from_text(&positional[0]),
        (None, _) => {
            return Err(ArgsError::Usage(
                "The parameters number is not correct!".into(),
            ))
        }
    };
    if command.argv.is_empty() {
        return Err(ArgsError::Usage("empty command".into()));
    }

    Ok(ParsedArgs::Run(RunArgs {
        interval_ms,
        db,
        report_every_secs,
        clamp_negative,
        command,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("perfvisual")
            .chain(v.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run(v: &[&str]) -> RunArgs {
        match parse_args(args(v)) {
            Ok(ParsedArgs::Run(r)) => r,
            other => panic!("expected run args, got {other:?}"),
        }
    }

    #[test]
    fn quoted_command_with_interval() {
        let r = run(&["--interval", "500", "java -jar myapp.jar"]);
        assert_eq!(r.interval_ms, Some(500));
        assert_eq!(r.command.argv, vec!["java", "-jar", "myapp.jar"]);
        assert_eq!(r.command.text, "java -jar myapp.jar");
        assert!(!r.clamp_negative);

        let short = run(&["-i", "250", "-o", "out.db", "sleep 1"]);
        assert_eq!(short.interval_ms, Some(250));
        assert_eq!(short.db, Some(PathBuf::from("out.db")));

        let assigned = run(&["--interval=20", "--db=x.db", "--report-every=1", "true"]);
        assert_eq!(assigned.interval_ms, Some(20));
        assert_eq!(assigned.db, Some(PathBuf::from("x.db")));
        assert_eq!(assigned.report_every_secs, Some(1));
    }

    #[test]
    fn explicit_argv_after_double_dash() {
        let r = run(&["--clamp-negative", "--", "cp", "my file.txt", "-r"]);
        assert!(r.clamp_negative);
        assert_eq!(r.command.argv, vec!["cp", "my file.txt", "-r"]);
    }

    #[test]
    fn wrong_number_of_commands_is_an_error() {
        assert!(matches!(parse_args(args(&[])), Err(ArgsError::Usage(_))));
        assert!(matches!(
            parse_args(args(&["sleep 1", "sleep 2"])),
            Err(ArgsError::Usage(_))
        ));
        assert!(matches!(
            parse_args(args(&["sleep 1", "--", "sleep"])),
            Err(ArgsError::Usage(_))
        ));
        assert!(matches!(parse_args(args(&["   "])), Err(ArgsError::Usage(_))));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            parse_args(args(&["--interval", "0", "true"])),
            Err(ArgsError::BadValue {
                flag: "--interval",
                value: "0".into()
            })
        );
        assert!(matches!(
            parse_args(args(&["--interval", "fast", "true"])),
            Err(ArgsError::BadValue { .. })
        ));
        assert_eq!(
            parse_args(args(&["true", "-i"])),
            Err(ArgsError::MissingValue("--interval"))
        );
        assert!(matches!(
            parse_args(args(&["--bogus", "true"])),
            Err(ArgsError::Usage(_))
        ));
    }

    #[test]
    fn help_and_version_short_circuit() {
        match parse_args(args(&["-i", "5", "--help"])) {
            Ok(ParsedArgs::Help(text)) => {
                assert!(text.contains("Usage:") && text.contains("--interval"))
            }
            other => panic!("expected help, got {other:?}"),
        }
        assert_eq!(parse_args(args(&["--version"])), Ok(ParsedArgs::Version));
    }
}
