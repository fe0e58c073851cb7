//! Embed a perfvisual SQLite recording into an HTML visualization template, producing a single
//! self-contained file.

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DB_PLACEHOLDER: &str = "let embedDB = null;";
const NAME_PLACEHOLDER: &str = "let embedFn = null;";

struct ParsedArgs {
    template: PathBuf,
    db: PathBuf,
    output: Option<PathBuf>,
}

fn usage(prog: &str) -> String {
    format!("Usage: {prog} [--output OUT|-o OUT] <visual.html> <db.sqlite>")
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Option<ParsedArgs>, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "perfvisual_embed".into());
    let mut output: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--output" | "-o" => {
                output = Some(
                    it.next()
                        .map(PathBuf::from)
                        .ok_or_else(|| format!("missing value for --output\n{}", usage(&prog)))?,
                );
            }
            _ if arg.starts_with("--output=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        output = Some(PathBuf::from(v));
                    }
                }
            }
            _ => positional.push(arg),
        }
    }
    match <[String; 2]>::try_from(positional) {
        Ok([template, db]) => Ok(Some(ParsedArgs {
            template: PathBuf::from(template),
            db: PathBuf::from(db),
            output,
        })),
        Err(_) => Err(format!(
            "{}\n\n[ERROR]: The parameters number is not correct!",
            usage(&prog)
        )),
    }
}

/// `perf_20240315.db` -> `perf_visual.html`; the prefix is the file name up to its first `_`.
fn default_output(db: &Path) -> PathBuf {
    let name = db
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = name.split('_').next().unwrap_or_default();
    PathBuf::from(format!("{prefix}_visual.html"))
}

/// Replace the two placeholders. Returns the new page and whether both were found.
fn embed(template: &str, db_base64: &str, db_name: &str) -> (String, bool) {
    let complete = template.contains(DB_PLACEHOLDER) && template.contains(NAME_PLACEHOLDER);
    let page = template
        .replace(DB_PLACEHOLDER, &format!("let embedDB = \"{db_base64}\";"))
        .replace(NAME_PLACEHOLDER, &format!("let embedFn = \"{db_name}\";"));
    (page, complete)
}

fn run(args: &ParsedArgs) -> anyhow::Result<PathBuf> {
    let db_bytes =
        fs::read(&args.db).with_context(|| format!("reading {}", args.db.display()))?;
    let template = fs::read_to_string(&args.template)
        .with_context(|| format!("reading {}", args.template.display()))?;
    let Some(db_name) = args.db.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        bail!("{} is not a file", args.db.display());
    };

    let (page, complete) = embed(&template, &STANDARD.encode(&db_bytes), &db_name);
    if !complete {
        warn!(
            "{} lacks '{DB_PLACEHOLDER}' or '{NAME_PLACEHOLDER}'; output may not load the data",
            args.template.display()
        );
    }

    let out = args.output.clone().unwrap_or_else(|| default_output(&args.db));
    fs::write(&out, page).with_context(|| format!("writing {}", out.display()))?;
    Ok(out)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let parsed = match parse_args(env::args()) {
        Ok(Some(p)) => p,
        Ok(None) => {
            println!("{}", usage("perfvisual_embed"));
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(1);
        }
    };
    match run(&parsed) {
        Ok(out) => {
            println!("Successfully generated: {}", out.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("[ERROR]: {e:#}");
            ExitCode::from(1)
        }
    }
}
