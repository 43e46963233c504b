//! CLI layer: argument parsing, logging setup and subcommand implementations.

pub mod args;

pub use args::*;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api_trace::{
    collect_files, extract_project, render, resolve_ascent, run_trace, write_report,
    ReportFormat, TraceError,
};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Trace which UI controls trigger which API calls in a server-rendered C# web project
#[derive(Parser, Debug)]
#[command(name = "api-trace", version, about, after_help = "\
Run 'api-trace <COMMAND> --help' for detailed options and examples.\n\
Common options: -d <DIR> (project root), -a <NAMES> (API methods), -t <N> (threads)")]
pub(crate) struct Cli {
    /// Log level for stderr output (error, warn, info, debug, trace).
    /// RUST_LOG overrides it when set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Trace API calls to their top-level callers and UI controls, and write the report
    Trace(TraceArgs),

    /// List the direct callers of a method and the top-level method each one reaches
    Callers(CallersArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Trace(args) => cmd_trace(args),
        Commands::Callers(args) => cmd_callers(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_log_level(level)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub(crate) fn normalize_log_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "error" => "error",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "warn",
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn cmd_trace(args: TraceArgs) -> Result<(), TraceError> {
    let format: ReportFormat = args.format.parse().map_err(TraceError::InvalidArgs)?;
    let config = args.scan.to_config();
    let output = output_path(args.output.as_deref(), &config.root, format);

    info!(dir = %config.root.display(), output = %output.display(), "Starting trace");
    let report = run_trace(&config)?;
    let body = render(&report, format, args.show_chain)?;
    write_report(&output, &body)?;

    eprintln!("Report saved to {}", output.display());
    Ok(())
}

fn cmd_callers(args: CallersArgs) -> Result<(), TraceError> {
    let config = args.scan.to_config();
    config.validate()?;
    let files = collect_files(&config)?;
    let extraction = extract_project(&files.sources, &config.api_surface, config.effective_threads())?;

    let callers = extraction.index.callers_of(&args.method);
    if callers.is_empty() {
        println!("No callers found for '{}'", args.method);
        return Ok(());
    }

    println!("Callers of '{}' ({}):", args.method, callers.len());
    for caller in callers {
        let ascent = resolve_ascent(caller, &extraction.index);
        let cycle = if ascent.cycle { " [cycle]" } else { "" };
        println!("  {}", caller);
        println!("    -> top-level: {}{}", ascent.top_level, cycle);
    }
    Ok(())
}

/// Explicit `--output`, or `api-trace-report.<ext>` inside the project root.
pub(crate) fn output_path(explicit: Option<&str>, root: &Path, format: ReportFormat) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(path),
        None => root.join(format!("api-trace-report.{}", format.extension())),
    }
}
