use ansi_term::Colour;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use thiserror::Error;

use al::digest::{Digester, Sha256Digester};
use al::organize::{organize, OrganizeReport};
use al::resolver::{resolve, RefinementStats};
use al::scan::{scan_directory, validate_directory};
use al::tree::render_tree;

/// Organizes a directory: duplicate files are set aside in `duplicate-files`
/// and every remaining file is moved into a directory named after its
/// extension (`txt-files`, `no-extension-files`, ...).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to organize, e.g. ~/Downloads
    directory: PathBuf,

    /// Show the tree of the resulting organized directory.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Classify files without moving anything.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Move files without asking for confirmation.
    #[arg(short = 'f', long)]
    force: bool,

    /// Summary format to emit after processing.
    #[arg(long, value_enum, default_value = "text")]
    summary_format: SummaryFormat,

    /// Optional path to write the final summary output.
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Logging verbosity (overridden by RUST_LOG when set).
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Exit with a non-zero status when any file could not be moved.
    #[arg(long)]
    fail_on_error: bool,

    /// Disable coloured output.
    #[arg(long)]
    no_color: bool,
}

#[derive(Copy, Clone, Debug, Serialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SummaryFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::None => LevelFilter::Off,
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Core(#[from] al::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("unable to encode summary: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0} files could not be moved")]
    MoveFailures(usize),
}

#[derive(Serialize)]
struct JsonSummary {
    directory: String,
    scanned_files: usize,
    scanned_bytes: u64,
    unique_files: usize,
    duplicate_files: usize,
    #[serde(flatten)]
    refinement: RefinementStats,
    elapsed_seconds: f64,
    dry_run: bool,
    summary_format: SummaryFormat,
    classification: BTreeMap<String, Vec<String>>,
    organize: Option<OrganizeReport>,
}

/// Byte count scaled to the largest binary unit that keeps it at or above 1.
fn human_readable(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{} min {} sec", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{:.1} sec", d.as_secs_f64())
    } else {
        format!("{} ms", d.as_millis())
    }
}

/// Sets up `env_logger` on stderr. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(level.into());
    }
    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{style}{:<5}{style:#} {}",
            record.level(),
            record.args()
        )
    });
    builder.init();
}

/// Writes the summary to `path`, creating missing parent directories.
fn write_summary_to_path(path: &Path, contents: &str) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
        _ => {}
    }
    let trailer = if contents.ends_with('\n') { "" } else { "\n" };
    fs::write(path, format!("{contents}{trailer}"))
}

/// Asks before moving anything. The prompt goes to `out` so a JSON summary on
/// stdout stays parseable.
fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    moves: usize,
    dir: &Path,
) -> io::Result<bool> {
    write!(
        out,
        "WARNING: This will move {} files into per-extension directories under {}. Do you wish to proceed? (y/N): ",
        moves,
        dir.display()
    )?;
    out.flush()?;
    let mut confirmation = String::new();
    input.read_line(&mut confirmation)?;
    Ok(confirmation.trim().eq_ignore_ascii_case("y"))
}

fn ask_to_proceed<R: BufRead>(
    input: &mut R,
    text_output: bool,
    moves: usize,
    dir: &Path,
) -> io::Result<bool> {
    if text_output {
        confirm(input, &mut io::stdout().lock(), moves, dir)
    } else {
        confirm(input, &mut io::stderr().lock(), moves, dir)
    }
}

fn run_app<R: BufRead, D: Digester>(
    args: Args,
    mut input: R,
    digester: &mut D,
) -> Result<(), AppError> {
    let text_output = args.summary_format == SummaryFormat::Text;
    let color = !args.no_color && io::stdout().is_terminal();
    let mut summary_lines: Vec<String> = Vec::new();

    validate_directory(&args.directory)?;
    let dir = fs::canonicalize(&args.directory)?;
    log::info!("Organizing directory: {}", dir.display());

    let start = Instant::now();
    let scan = scan_directory(&dir)?;
    let scanned_files = scan.scanned_files;
    let scanned_bytes = scan.total_bytes;
    let resolution = resolve(scan.sizes, digester)?;
    let elapsed = start.elapsed();

    let classification = resolution.classification;
    let stats = resolution.stats;
    log::info!(
        "Hashed {} files partially and {} fully.",
        stats.partial_digests,
        stats.full_digests
    );

    let summary = format!(
        "{} files scanned ({}), {} unique, {} duplicates found in {}.",
        scanned_files,
        human_readable(scanned_bytes),
        classification.unique_count(),
        classification.duplicate_count(),
        format_duration(elapsed)
    );
    summary_lines.push(format!("Organize summary: {}", summary));
    if text_output {
        if color {
            println!(
                "{} {}",
                Colour::RGB(173, 216, 230).paint("Organize summary:"),
                Colour::RGB(255, 255, 224).paint(summary.as_str())
            );
        } else {
            println!("Organize summary: {}", summary);
        }
        if args.verbose {
            print!("{}", render_tree(&dir, &classification, color));
        }
    }

    let mut organize_report: Option<OrganizeReport> = None;
    if args.dry_run {
        let line = "Dry run; no files were moved.";
        if text_output {
            println!("{}", line);
        }
        summary_lines.push(line.to_string());
    } else if classification.is_empty() {
        let line = "Nothing to organize.";
        if text_output {
            println!("{}", line);
        }
        summary_lines.push(line.to_string());
    } else if !args.force
        && !ask_to_proceed(&mut input, text_output, classification.len(), &dir)?
    {
        let line = "Operation cancelled.";
        if text_output {
            println!("{}", line);
        }
        summary_lines.push(line.to_string());
    } else {
        let report = organize(&dir, &classification);
        let line = format!(
            "Operation complete. Moved {} / {} files.",
            report.successes, report.total_candidates
        );
        if text_output {
            println!("{}", line);
        }
        summary_lines.push(line);
        for failure in &report.failures {
            summary_lines.push(format!(
                "Failure: {}: {}",
                failure.path.display(),
                failure.error
            ));
        }
        if !report.failures.is_empty() {
            eprintln!("Completed with {} failures.", report.failures.len());
        }
        organize_report = Some(report);
    }

    let contents = match args.summary_format {
        SummaryFormat::Json => {
            let json_summary = JsonSummary {
                directory: dir.display().to_string(),
                scanned_files,
                scanned_bytes,
                unique_files: classification.unique_count(),
                duplicate_files: classification.duplicate_count(),
                refinement: stats,
                elapsed_seconds: elapsed.as_secs_f64(),
                dry_run: args.dry_run,
                summary_format: args.summary_format,
                classification: classification.to_name_map(),
                organize: organize_report.clone(),
            };
            let json_output = serde_json::to_string_pretty(&json_summary)?;
            println!("{}", json_output);
            json_output
        }
        SummaryFormat::Text => summary_lines.join("\n"),
    };

    if let Some(path) = &args.summary_path {
        write_summary_to_path(path, &contents)?;
    }

    match organize_report {
        Some(report) if args.fail_on_error && !report.failures.is_empty() => {
            Err(AppError::MoveFailures(report.failures.len()))
        }
        _ => Ok(()),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_level);
    let stdin = io::stdin();
    match run_app(args, stdin.lock(), &mut Sha256Digester) {
        Ok(()) => {}
        Err(AppError::Core(err)) if err.is_invalid_input() => {
            eprintln!("{}", err);
            process::exit(1);
        }
        Err(AppError::Core(err)) => {
            eprintln!("Error: {}. No files were moved.", err);
            process::exit(1);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}
