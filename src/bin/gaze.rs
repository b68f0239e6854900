//! Gaze CLI - Command-line interface for Synheart Gaze
//!
//! Commands:
//! - run: Process streaming frames from stdin (streaming mode)
//! - replay: Process a recorded session file (batch mode)
//! - validate: Validate frame schema
//! - thresholds: Print effective alert thresholds
//! - doctor: Diagnose configuration and session state

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_gaze::alerts::{AlertThresholds, NdjsonSink, ThresholdOverrides};
use synheart_gaze::config::MonitorConfig;
use synheart_gaze::frame::{parse_array, parse_ndjson, FrameInput};
use synheart_gaze::pipeline::{FrameReport, MonitorProcessor};
use synheart_gaze::{ComputeError, GAZE_VERSION, PRODUCER_NAME};

/// Gaze - On-device ocular metrics and wellbeing alerts
#[derive(Parser)]
#[command(name = "gaze")]
#[command(author = "Synheart AI Inc")]
#[command(version = GAZE_VERSION)]
#[command(about = "Turn facial landmark streams into eye metrics and alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming frames from stdin (streaming mode)
    Run {
        /// Configuration file (thresholds, alert log)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Resume a session from a saved state file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save session state to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Emit only alerts instead of full frame reports
        #[arg(long)]
        alerts_only: bool,

        /// Log and skip frames that fail to parse or are out of order
        #[arg(long)]
        skip_invalid: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Process a recorded session file (batch mode)
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
        output_format: OutputFormat,

        /// Configuration file (thresholds, alert log)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit only alerts instead of full frame reports
        #[arg(long)]
        alerts_only: bool,

        /// Save session state to file after processing
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Validate frame schema
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

    /// Print effective alert thresholds
    Thresholds {
        /// Configuration file whose overrides to apply
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Inline JSON overrides, applied after the config file
        #[arg(long)]
        overrides: Option<String>,
    },

    /// Diagnose configuration and session state
    Doctor {
        /// Check configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Check saved session state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
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
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<(), GazeCliError> {
    match cli.command {
        Commands::Run {
            config,
            load_state,
            save_state,
            alerts_only,
            skip_invalid,
            flush,
        } => cmd_run(
            config.as_deref(),
            load_state.as_deref(),
            save_state.as_deref(),
            alerts_only,
            skip_invalid,
            flush,
        ),

        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            alerts_only,
            save_state,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            alerts_only,
            save_state.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Thresholds { config, overrides } => {
            cmd_thresholds(config.as_deref(), overrides.as_deref())
        }

        Commands::Doctor {
            config,
            state,
            json,
        } => cmd_doctor(config.as_deref(), state.as_deref(), json),
    }
}

fn cmd_run(
    config: Option<&Path>,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    alerts_only: bool,
    skip_invalid: bool,
    flush: bool,
) -> Result<(), GazeCliError> {
    let mut processor = build_processor(config)?;

    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        processor.load_state(&state_json)?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut skipped = 0usize;

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let report = serde_json::from_str::<FrameInput>(trimmed)
            .map_err(|e| GazeCliError::ParseError(format!("line {}: {}", index + 1, e)))
            .and_then(|frame| processor.process_frame(&frame).map_err(GazeCliError::from));

        let report = match report {
            Ok(report) => report,
            Err(e) if skip_invalid => {
                tracing::warn!(line = index + 1, error = ?e, "skipping frame");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        write_records(&mut stdout, &report, alerts_only)?;
        if flush {
            stdout.flush()?;
        }
    }
    stdout.flush()?;

    if skipped > 0 {
        tracing::warn!(skipped, "frames skipped");
    }

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    Ok(())
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    alerts_only: bool,
    save_state: Option<&Path>,
) -> Result<(), GazeCliError> {
    let frames = read_frames(input, &input_format)?;

    if frames.is_empty() {
        return Err(GazeCliError::NoFrames);
    }

    let mut processor = build_processor(config)?;
    let mut reports = Vec::with_capacity(frames.len());
    for frame in &frames {
        reports.push(processor.process_frame(frame)?);
    }

    let output_data = if alerts_only {
        let alerts: Vec<_> = reports.iter().flat_map(|r| r.alerts.iter()).collect();
        format_output(&alerts, &output_format)?
    } else {
        format_output(&reports, &output_format)?
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), GazeCliError> {
    let frames = read_frames(input, &input_format)?;

    let mut errors = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;
    for (index, frame) in frames.iter().enumerate() {
        if let Err(e) = frame.validate() {
            errors.push(ValidationErrorDetail {
                index,
                timestamp: frame.timestamp.to_rfc3339(),
                error: e.to_string(),
            });
        } else if previous.is_some_and(|p| frame.timestamp < p) {
            errors.push(ValidationErrorDetail {
                index,
                timestamp: frame.timestamp.to_rfc3339(),
                error: "Timestamp precedes the previous frame".to_string(),
            });
        }
        previous = Some(frame.timestamp);
    }

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - errors.len(),
        invalid_frames: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame {} (index {}): {}",
                    err.timestamp, err.index, err.error
                );
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(GazeCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_thresholds(config: Option<&Path>, overrides: Option<&str>) -> Result<(), GazeCliError> {
    let mut thresholds = match config {
        Some(path) => MonitorConfig::from_file(path)?.resolved_thresholds()?,
        None => AlertThresholds::default(),
    };

    if let Some(json) = overrides {
        thresholds = thresholds.merge(&ThresholdOverrides::from_json(json)?);
        thresholds.validate()?;
    }

    println!("{}", serde_json::to_string_pretty(&thresholds)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, state: Option<&Path>, json: bool) -> Result<(), GazeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "gaze_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Gaze version {}", GAZE_VERSION),
    });

    let mut processor = MonitorProcessor::new();

    if let Some(config_path) = config {
        match MonitorConfig::from_file(config_path) {
            Ok(config) => {
                match MonitorProcessor::with_thresholds(&config.thresholds) {
                    Ok(configured) => {
                        processor = configured;
                        checks.push(DoctorCheck {
                            name: "thresholds".to_string(),
                            status: CheckStatus::Ok,
                            message: if config.thresholds.is_empty() {
                                "Using default thresholds".to_string()
                            } else {
                                "Threshold overrides valid".to_string()
                            },
                        });
                    }
                    Err(e) => checks.push(DoctorCheck {
                        name: "thresholds".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    }),
                }

                if let Some(log_path) = &config.alert_log {
                    checks.push(alert_log_check(log_path));
                }
            }
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot load config: {}", e),
            }),
        }
    }

    if let Some(state_path) = state {
        let check = if !state_path.exists() {
            DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(state_path)
                .map_err(ComputeError::from)
                .and_then(|json| processor.load_state(&json))
            {
                Ok(()) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Ok,
                    message: match processor.last_timestamp() {
                        Some(at) => format!("Session state valid (last frame {})", at.to_rfc3339()),
                        None => "Session state valid (no frames yet)".to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid session state: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GAZE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Gaze Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GazeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn build_processor(config: Option<&Path>) -> Result<MonitorProcessor, GazeCliError> {
    let config = match config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    let processor = MonitorProcessor::with_thresholds(&config.thresholds)?;
    Ok(match &config.alert_log {
        Some(path) => processor.with_sink(NdjsonSink::append_to(path)?),
        None => processor,
    })
}

fn read_frames(input: &Path, format: &InputFormat) -> Result<Vec<FrameInput>, GazeCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    Ok(match format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_array(&input_data)?,
    })
}

fn write_records(
    out: &mut impl Write,
    report: &FrameReport,
    alerts_only: bool,
) -> Result<(), GazeCliError> {
    if alerts_only {
        for alert in &report.alerts {
            writeln!(out, "{}", serde_json::to_string(alert)?)?;
        }
    } else {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }
    Ok(())
}

fn format_output<T: serde::Serialize>(
    records: &[T],
    format: &OutputFormat,
) -> Result<String, GazeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut output = String::new();
            for record in records {
                output.push_str(&serde_json::to_string(record)?);
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn alert_log_check(path: &Path) -> DoctorCheck {
    let parent_exists = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        _ => true,
    };

    if parent_exists {
        DoctorCheck {
            name: "alert_log".to_string(),
            status: CheckStatus::Ok,
            message: format!("Alerts will be appended to {}", path.display()),
        }
    } else {
        DoctorCheck {
            name: "alert_log".to_string(),
            status: CheckStatus::Error,
            message: format!("Alert log directory for {} does not exist", path.display()),
        }
    }
}

// Error types

#[derive(Debug)]
enum GazeCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for GazeCliError {
    fn from(e: io::Error) -> Self {
        GazeCliError::Io(e)
    }
}

impl From<ComputeError> for GazeCliError {
    fn from(e: ComputeError) -> Self {
        GazeCliError::Compute(e)
    }
}

impl From<serde_json::Error> for GazeCliError {
    fn from(e: serde_json::Error) -> Self {
        GazeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GazeCliError> for CliError {
    fn from(e: GazeCliError) -> Self {
        match e {
            GazeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GazeCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidThresholds(_) => (
                        "INVALID_THRESHOLDS",
                        "Run 'gaze thresholds' to inspect effective values",
                    ),
                    ComputeError::NonMonotonicTimestamp { .. } => (
                        "OUT_OF_ORDER",
                        "Sort frames by timestamp or pass --skip-invalid",
                    ),
                    ComputeError::StateError(_) => (
                        "STATE_ERROR",
                        "Run 'gaze doctor --state <file>' for details",
                    ),
                    ComputeError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => ("PARSE_ERROR", "Run 'gaze validate' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            GazeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GazeCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            GazeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            GazeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            GazeCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
