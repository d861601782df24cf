//! Interact CLI - Command-line interface for Synheart Interact
//!
//! Commands:
//! - replay: Replay recorded timed signals into event records
//! - validate: Check recorded signals without replaying them
//! - config: Print the effective tracker configuration
//! - schema: Print the event-kind taxonomy

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use synheart_interact::signal::SignalIssue;
use synheart_interact::sink::console_line;
use synheart_interact::types::EventKind;
use synheart_interact::{
    replay, EventRecord, TimedSignal, TrackerConfig, TrackerError, INTERACT_VERSION,
    PRODUCER_NAME,
};

/// Interact - On-device capture of page interaction events
#[derive(Parser)]
#[command(name = "interact")]
#[command(author = "Synheart AI Inc")]
#[command(version = INTERACT_VERSION)]
#[command(about = "Replay and inspect interaction signal recordings", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay timed signals and emit event records
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        format: OutputFormat,

        /// Tracker configuration file (JSON, camelCase keys)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate recorded signals
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Tracker configuration file (JSON, camelCase keys)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the event-kind taxonomy
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one signal per line)
    Ndjson,
    /// JSON array of signals
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// One human-readable line per record
    Console,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), InteractCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            format,
            config,
        } => cmd_replay(&input, &output, input_format, format, config.as_deref()),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config { config } => cmd_config(config.as_deref()),

        Commands::Schema { json } => cmd_schema(json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), InteractCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let signals = match input_format {
        InputFormat::Ndjson => TimedSignal::parse_ndjson(&input_data)?,
        InputFormat::Json => TimedSignal::parse_array(&input_data)?,
    };

    if signals.is_empty() {
        return Err(InteractCliError::NoSignals);
    }
    if signals.iter().all(|s| s.at.is_none()) {
        warn!("no signal carries an `at` timestamp; replaying at wall-clock time");
    }

    info!(signals = signals.len(), "replaying");
    let records = replay(signals, config)?;
    info!(records = records.len(), "replay finished");

    let output_data = format_output(&records, &format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), InteractCliError> {
    let input_data = read_input(input)?;

    let check = match input_format {
        InputFormat::Ndjson => TimedSignal::check_ndjson(&input_data),
        InputFormat::Json => TimedSignal::check_array(&input_data)?,
    };
    debug!(total = check.total, invalid = check.issues.len(), "validated");

    let report = ValidationReport {
        total_signals: check.total,
        valid_signals: check.valid(),
        invalid_signals: check.issues.len(),
        errors: check.issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total signals:   {}", report.total_signals);
        println!("Valid signals:   {}", report.valid_signals);
        println!("Invalid signals: {}", report.invalid_signals);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                let unit = match input_format {
                    InputFormat::Ndjson => "Line",
                    InputFormat::Json => "Entry",
                };
                println!("  - {} {}: {}", unit, err.position, err.error);
            }
        }
    }

    if report.invalid_signals > 0 {
        Err(InteractCliError::ValidationFailed(report.invalid_signals))
    } else {
        Ok(())
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), InteractCliError> {
    let config = load_config(config)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_schema(json: bool) -> Result<(), InteractCliError> {
    if json {
        let kinds: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        let schema = serde_json::json!({
            "producer": PRODUCER_NAME,
            "version": INTERACT_VERSION,
            "event_kinds": kinds,
            "record_fields": [
                "sequence_number",
                "timestamp_utc",
                "relative_time_ms",
                "event_kind",
                "event_subject",
                "target_descriptor",
                "payload",
                "session_snapshot"
            ],
        });
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        println!("Event kinds ({}):", EventKind::ALL.len());
        println!();
        for kind in EventKind::ALL {
            println!("  {}", kind.as_str());
        }
        println!();
        println!("Every record carries sequence_number, timestamp_utc, relative_time_ms,");
        println!("event_kind, event_subject, payload and a session_snapshot");
        println!("{{ session_id, time_on_page_ms, event_count, max_scroll_depth, is_idle }}.");
        println!("Element-originated records add target_descriptor");
        println!("{{ element_type, identifier, path }}.");
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, InteractCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            warn!("reading signals from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, InteractCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let config = TrackerConfig::from_json(&json).map_err(InteractCliError::Config)?;
            debug!(?config, "loaded configuration");
            Ok(config)
        }
        None => Ok(TrackerConfig::default()),
    }
}

fn format_output(records: &[EventRecord], format: &OutputFormat) -> Result<String, InteractCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
        OutputFormat::Console => {
            let mut out = String::new();
            for record in records {
                out.push_str(&console_line(record));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

// Error types

#[derive(Debug)]
enum InteractCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Config(TrackerError),
    Json(serde_json::Error),
    NoSignals,
    ValidationFailed(usize),
}

impl From<io::Error> for InteractCliError {
    fn from(e: io::Error) -> Self {
        InteractCliError::Io(e)
    }
}

impl From<TrackerError> for InteractCliError {
    fn from(e: TrackerError) -> Self {
        InteractCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for InteractCliError {
    fn from(e: serde_json::Error) -> Self {
        InteractCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InteractCliError> for CliError {
    fn from(e: InteractCliError) -> Self {
        match e {
            InteractCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InteractCliError::Tracker(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'interact validate' for per-line details".to_string()),
            },
            InteractCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'interact config' to see the accepted keys".to_string()),
            },
            InteractCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InteractCliError::NoSignals => CliError {
                code: "NO_SIGNALS".to_string(),
                message: "No signals found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            InteractCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} signals failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_signals: usize,
    valid_signals: usize,
    invalid_signals: usize,
    errors: Vec<SignalIssue>,
}
